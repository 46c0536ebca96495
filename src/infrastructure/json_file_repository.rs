// File-backed configuration repository, one JSON document per name
use crate::application::config_repository::ConfigRepository;
use crate::domain::document::ConfigDocument;
use crate::domain::error::PersistenceError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    data_dir: PathBuf,
}

impl JsonFileRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        // Names become file names, keep them to a safe alphabet
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::Terminal(format!(
                "invalid configuration name {name:?}"
            )));
        }
        Ok(self.data_dir.join(format!("{name}.json")))
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> PersistenceError {
    PersistenceError::Retriable(format!("{action} {}: {e}", path.display()))
}

#[async_trait]
impl ConfigRepository for JsonFileRepository {
    async fn load(&self, name: &str) -> Result<Option<ConfigDocument>, PersistenceError> {
        let path = self.path_for(name)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("reading", &path, e)),
        };

        let document = serde_json::from_slice(&raw).map_err(|e| {
            PersistenceError::Terminal(format!("parsing {}: {e}", path.display()))
        })?;
        tracing::debug!(config = %name, path = %path.display(), "Loaded configuration file");
        Ok(Some(document))
    }

    async fn save(&self, name: &str, document: &ConfigDocument) -> Result<(), PersistenceError> {
        let path = self.path_for(name)?;
        let body = serde_json::to_vec_pretty(document)
            .map_err(|e| PersistenceError::Terminal(format!("encoding {name}: {e}")))?;

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| io_error("creating", &self.data_dir, e))?;

        // Readers only ever see the old or the new file
        let tmp = self.data_dir.join(format!(".{name}.json.tmp"));
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| io_error("writing", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("renaming", &path, e))?;

        tracing::debug!(config = %name, bytes = body.len(), "Wrote configuration file");
        Ok(())
    }
}
