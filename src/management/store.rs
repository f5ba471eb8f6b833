use std::{io, path::{Path, PathBuf}};

use crate::{config, types::Token};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no token file at {0}")]
    NotFound(PathBuf),

    #[error("token file {path} is invalid: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode token: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the token file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Single-record persistence for the user's [`Token`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    /// `~/.config/spotcli/token.json`
    pub fn default_path() -> Option<PathBuf> {
        config::app_dir().map(|dir| dir.join("token.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        async_fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    pub async fn load(&self) -> Result<Token, StoreError> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let token: Token = serde_json::from_str(&content).map_err(|e| StoreError::Invalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        token.validate().map_err(|reason| StoreError::Invalid {
            path: self.path.clone(),
            reason,
        })?;

        Ok(token)
    }

    /// Writes the token next to its destination and renames it into place, so
    /// readers only ever see a complete file.
    pub async fn save(&self, token: &Token) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_private_dir(parent).await?;
        }

        let json = serde_json::to_string_pretty(token)?;
        let tmp = self.tmp_path();

        if let Err(e) = write_private(&tmp, json.as_bytes()).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(StoreError::io(&tmp, e));
        }

        if let Err(e) = async_fs::rename(&tmp, &self.path).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "token.json".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }
}

// Mode 0600 is applied at creation, before any content is written.
async fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let _ = async_fs::remove_file(path).await;

    let mut options = async_fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use async_fs::unix::OpenOptionsExt;
        options.mode(0o600);
    }
    drop(options.open(path).await?);

    async_fs::write(path, contents).await
}

async fn ensure_private_dir(dir: &Path) -> Result<(), StoreError> {
    if async_fs::metadata(dir).await.is_ok() {
        return Ok(());
    }

    async_fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        async_fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|e| StoreError::io(dir, e))?;
    }
    Ok(())
}
