use std::fs;
use std::path::{Path, PathBuf};

use svgsketch_core::document::Document;
use thiserror::Error;
use tracing::debug;

pub mod svg;

pub use svg::{
    ImportReport, ImportedShape, SvgImporter, Unit, VectorDocument, VectorImporter, ViewBox,
    parse_length, parse_vector_document,
};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("invalid SVG markup: {0}")]
    InvalidMarkup(String),
    #[error("missing `{attribute}` attribute on the root element")]
    MissingDimension { attribute: &'static str },
    #[error("cannot interpret `{attribute}` value \"{raw}\"")]
    InvalidDimension { attribute: &'static str, raw: String },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 宿主文档的原生存储格式（JSON）。
pub struct NativeFacade;

impl NativeFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for NativeFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Document = serde_json::from_str(&data)
            .map_err(|err| IoError::InvalidDocument(format!("{}: {err}", path.display())))?;
        debug!(path = %path.display(), objects = document.len(), "文档已载入");
        Ok(document)
    }
}

impl DocumentSaver for NativeFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let data = serde_json::to_string_pretty(document)
            .map_err(|err| IoError::InvalidDocument(err.to_string()))?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), objects = document.len(), "文档已保存");
        Ok(())
    }
}
