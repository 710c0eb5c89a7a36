use crate::errors::{NormalizeError, NormalizeErrorType};
use crate::image_ops::image_types::{Extensions, MimeType};
use crate::image_ops::operations::{self, Processed};
use crate::store::media_storage::MediaStorage;
use crate::store::record_store::RecordStore;
use crate::utils::naming::{archive_name, free_name, normalized_name};
use crate::utils::types::{OwnerField, OwnerRecord};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::spawn_blocking;
use tracing::instrument;

/// Size and format policy applied to every owner image
#[derive(Clone, Debug)]
pub struct NormalizeSettings {
    pub max_width: NonZeroU32,
    /// 1..=100
    pub quality: u8,
    pub extension: Extensions,
    /// Archive tree for superseded originals, relative to the media root
    pub archive_dir: String,
    /// Decode and resize, but write, save and archive nothing
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EmptyField,
    MissingFile,
    WithinBounds { width: u32, height: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyField => f.write_str("no image"),
            SkipReason::MissingFile => f.write_str("file is missing"),
            SkipReason::WithinBounds { width, height } => {
                write!(f, "already within bounds ({}x{})", width, height)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Normalized {
        from: String,
        to: String,
        archived_to: String,
        width: u32,
        height: u32,
    },
    /// Shared original already replaced earlier in the run, record now
    /// points at the same replacement
    Repointed {
        from: String,
        to: String,
    },
    /// Dry run result: what a real run would have written
    Planned {
        from: String,
        to: String,
        width: u32,
        height: u32,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub normalized: usize,
    pub repointed: usize,
    pub planned: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Stopped early on request. Remaining images were not processed, but
    /// records sharing an already archived file were still repointed
    pub cancelled: bool,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "normalized={} repointed={} planned={} skipped={} failed={}",
            self.normalized, self.repointed, self.planned, self.skipped, self.failed
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// Brings owner images in line with [`NormalizeSettings`], one record at a time
pub struct Normalizer {
    records: Arc<dyn RecordStore + Send + Sync>,
    media: Arc<dyn MediaStorage + Send + Sync>,
    settings: NormalizeSettings,
    cancel: Option<watch::Receiver<bool>>,
}

impl Normalizer {
    pub fn new(
        records: Arc<dyn RecordStore + Send + Sync>,
        media: Arc<dyn MediaStorage + Send + Sync>,
        settings: NormalizeSettings,
    ) -> Self {
        Normalizer {
            records,
            media,
            settings,
            cancel: None,
        }
    }

    /// Stop between records once `true` is sent on the channel
    pub fn with_cancel_token(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run over every record of every listed (kind, field) pair.
    ///
    /// Per-record failures are logged and counted, never propagated.
    /// Records sharing a file with one normalized earlier in the run are
    /// repointed at the same replacement instead of being left dangling.
    pub async fn normalize_all(&self, fields: &[OwnerField]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        // archived original -> replacement, for this run only
        let mut retired: HashMap<String, String> = HashMap::new();

        for owner_field in fields {
            let records = match self.records.list(owner_field.kind).await {
                Ok(records) => records,
                Err(err) => {
                    error!("Failed to list {} records: {}", owner_field.kind, err);
                    summary.failed += 1;
                    continue;
                }
            };
            info!("Processing {} ({} records)", owner_field, records.len());
            let field = owner_field.field.as_str();

            for record in records {
                if !summary.cancelled && self.is_cancelled() {
                    warn!("Stop requested, leaving remaining images untouched");
                    summary.cancelled = true;
                }
                if summary.cancelled && retired.is_empty() {
                    return summary;
                }

                let replacement = record
                    .image(field)
                    .and_then(|path| retired.get_key_value(path));
                let result = match replacement {
                    Some((from, to)) => self.repoint(&record, field, from, to).await,
                    // after a stop only references to archived files are fixed up
                    None if summary.cancelled => continue,
                    None => self.normalize_record(&record, field).await,
                };

                match result {
                    Ok(Outcome::Normalized {
                        from,
                        to,
                        archived_to,
                        width,
                        height,
                    }) => {
                        summary.normalized += 1;
                        info!(
                            "Normalized {} {}: {} -> {} ({}x{} {}), original archived to {}",
                            record,
                            field,
                            from,
                            to,
                            width,
                            height,
                            self.settings.extension.mime_type(),
                            archived_to
                        );
                        retired.insert(from, to);
                    }
                    Ok(Outcome::Repointed { from, to }) => {
                        summary.repointed += 1;
                        info!(
                            "Repointed {} {}: {} -> {} (shared file already normalized)",
                            record, field, from, to
                        );
                    }
                    Ok(Outcome::Planned {
                        from,
                        to,
                        width,
                        height,
                    }) => {
                        summary.planned += 1;
                        info!(
                            "[dry run] {} {}: would write {} -> {} ({}x{})",
                            record, field, from, to, width, height
                        );
                    }
                    Ok(Outcome::Skipped(SkipReason::MissingFile)) => {
                        summary.skipped += 1;
                        warn!("Skipped {} {}: {}", record, field, SkipReason::MissingFile);
                    }
                    Ok(Outcome::Skipped(reason)) => {
                        summary.skipped += 1;
                        debug!("Skipped {} {}: {}", record, field, reason);
                    }
                    Err(err) => {
                        summary.failed += 1;
                        error!("Failed to normalize {} {}: {}", record, field, err);
                    }
                }
            }
        }

        summary
    }

    /// Normalize one image field of one record.
    ///
    /// The record is saved only after the new file is fully written, and the
    /// original is archived only after the record points at the new file.
    #[instrument(skip(self, record, field), fields(record = %record, field = %field))]
    pub async fn normalize_record(
        &self,
        record: &OwnerRecord,
        field: &str,
    ) -> Result<Outcome, NormalizeError> {
        let Some(path) = record.image(field).map(str::to_string) else {
            return Ok(Outcome::Skipped(SkipReason::EmptyField));
        };
        if !self.media.exists(&path).await? {
            return Ok(Outcome::Skipped(SkipReason::MissingFile));
        }

        let data = self.media.read(&path).await?;
        let max_width = self.settings.max_width;
        let extension = self.settings.extension;
        let quality = self.settings.quality;
        let processed =
            spawn_blocking(move || operations::process(&data, max_width, extension, quality))
                .await
                .map_err(|err| {
                    NormalizeError::new(
                        NormalizeErrorType::Encode,
                        Some(format!("image worker failed: {}", err)),
                    )
                })??;

        let container = match processed {
            Processed::WithinBounds { width, height } => {
                return Ok(Outcome::Skipped(SkipReason::WithinBounds { width, height }));
            }
            Processed::Resized(container) => container,
        };

        let new_name = normalized_name(&path, container.extension);
        let new_path = free_name(self.media.as_ref(), &new_name).await?;
        if self.settings.dry_run {
            return Ok(Outcome::Planned {
                from: path,
                to: new_path,
                width: container.width,
                height: container.height,
            });
        }

        self.media.write(&new_path, &container.data).await?;
        debug!("Wrote {} ({} bytes)", new_path, container.data.len());

        let mut updated = record.clone();
        updated.set_image(field, new_path.clone());
        if let Err(err) = self.records.save(&updated).await {
            if let Err(cleanup_err) = self.media.delete(&new_path).await {
                warn!("Left orphaned file {}: {}", new_path, cleanup_err);
            }
            return Err(err);
        }

        let archived_to = self.archive(&path).await.map_err(|err| {
            NormalizeError::file_system(format!(
                "record now points to {}, but original was not archived: {}",
                new_path, err.detail
            ))
        })?;

        Ok(Outcome::Normalized {
            from: path,
            to: new_path,
            archived_to,
            width: container.width,
            height: container.height,
        })
    }

    /// Point `field` at a replacement written earlier in the run
    async fn repoint(
        &self,
        record: &OwnerRecord,
        field: &str,
        from: &str,
        to: &str,
    ) -> Result<Outcome, NormalizeError> {
        let mut updated = record.clone();
        updated.set_image(field, to.to_string());
        self.records.save(&updated).await?;

        Ok(Outcome::Repointed {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Move a superseded file into the archive tree, never overwriting
    async fn archive(&self, path: &str) -> Result<String, NormalizeError> {
        let target = free_name(
            self.media.as_ref(),
            &archive_name(&self.settings.archive_dir, path),
        )
        .await?;
        self.media.move_file(path, &target).await?;
        Ok(target)
    }
}
