use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::Pipeline;

/// Persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Saves and restores a pipeline between runs.
pub trait PipelineStore: Send + Sync {
    /// Returns the saved pipeline with resume coercion applied, or `None` when
    /// nothing has been saved.
    fn load(&self) -> Result<Option<Pipeline>, StoreError>;

    fn save(&self, pipeline: &Pipeline) -> Result<(), StoreError>;
}

/// Stores one pipeline as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PipelineStore for JsonFileStore {
    fn load(&self) -> Result<Option<Pipeline>, StoreError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        Ok(Some(Pipeline::from_json(&json)?))
    }

    fn save(&self, pipeline: &Pipeline) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = pipeline.to_json()?;
        // An interrupted save leaves the previous file intact.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}
