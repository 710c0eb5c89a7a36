use anyhow::Context;
use log::{info, warn};
use site_media::config::Config;
use site_media::image_ops::processing::Normalizer;
use site_media::store::media_storage::LocalMediaStorage;
use site_media::store::persistent_store::PersistentRecordStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fallback = format!("site_media=info,{}=info", env!("CARGO_CRATE_NAME"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to read configuration")?;

    let records = Arc::new(
        PersistentRecordStore::open(&config.record_store_dir).with_context(|| {
            format!(
                "Failed to open record store at {}",
                config.record_store_dir.display()
            )
        })?,
    );
    let media = Arc::new(LocalMediaStorage::new(config.media_root.clone()));
    info!(
        "Normalizing images under {} (max width {}, quality {}, {}, archive {})",
        media.root().display(),
        config.settings.max_width,
        config.settings.quality,
        config.settings.extension,
        config.settings.archive_dir
    );
    if config.settings.dry_run {
        info!("Dry run: no files or records will be changed");
    }

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current record (Ctrl-C again to abort)");
            let _ = cancel_tx.send(true);
        }
        // SIGINT stays captured from here on, exit on the second press
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Aborted mid-record");
            std::process::exit(130);
        }
    });

    let normalizer =
        Normalizer::new(records.clone(), media, config.settings).with_cancel_token(cancel_rx);
    let summary = normalizer.normalize_all(&config.owner_fields).await;

    records.persist().context("Failed to flush record store")?;
    info!("Done: {}", summary);

    Ok(())
}
