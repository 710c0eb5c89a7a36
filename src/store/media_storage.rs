use crate::errors::NormalizeError;
use async_trait::async_trait;
use log::debug;
use std::path::{Component, Path, PathBuf};

/// File store under the media root.
///
/// Every path is relative to the root, the way owner records reference files.
#[async_trait]
pub trait MediaStorage {
    async fn exists(&self, path: &str) -> Result<bool, NormalizeError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, NormalizeError>;

    /// Write the whole file, creating parent directories as needed
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), NormalizeError>;

    async fn delete(&self, path: &str) -> Result<(), NormalizeError>;

    /// Move a file, creating parent directories of `to` as needed
    async fn move_file(&self, from: &str, to: &str) -> Result<(), NormalizeError>;
}

fn fs_err(op: &str, path: &str, err: std::io::Error) -> NormalizeError {
    NormalizeError::file_system(format!("{} {}: {}", op, path, err))
}

/// Media storage on the local filesystem
pub struct LocalMediaStorage {
    root: PathBuf,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalMediaStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` onto the media root, refusing anything that could escape it
    pub fn resolve(&self, path: &str) -> Result<PathBuf, NormalizeError> {
        let relative = Path::new(path);
        let mut has_normal = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_normal = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(NormalizeError::file_system(format!(
                        "path escapes media root: {}",
                        path
                    )));
                }
            }
        }
        if !has_normal {
            return Err(NormalizeError::file_system(format!(
                "empty media path: {:?}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(&self, full: &Path, path: &str) -> Result<(), NormalizeError> {
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| fs_err("create dir for", path, err))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn exists(&self, path: &str) -> Result<bool, NormalizeError> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(fs_err("stat", path, err)),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, NormalizeError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|err| fs_err("read", path, err))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<(), NormalizeError> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full, path).await?;

        // half-written files never appear under the final name
        let mut partial = full.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        if let Err(err) = tokio::fs::write(&partial, data).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fs_err("write", path, err));
        }
        if let Err(err) = tokio::fs::rename(&partial, &full).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fs_err("write", path, err));
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), NormalizeError> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|err| fs_err("delete", path, err))
    }

    async fn move_file(&self, from: &str, to: &str) -> Result<(), NormalizeError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        self.ensure_parent(&dst, to).await?;

        let rename_err = match tokio::fs::rename(&src, &dst).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        // rename can't cross filesystems (archive dir may be a mount), fall back to copy
        debug!("Rename {} -> {} failed ({}), copying", from, to, rename_err);
        if tokio::fs::copy(&src, &dst).await.is_err() {
            let _ = tokio::fs::remove_file(&dst).await;
            return Err(fs_err("move", from, rename_err));
        }
        tokio::fs::remove_file(&src)
            .await
            .map_err(|err| fs_err("remove moved", from, err))
    }
}
