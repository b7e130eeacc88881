use std::path::Path;

use svgsketch_core::document::Document;
use svgsketch_engine::errors::PipelineError;
use svgsketch_io::{DocumentLoader, NativeFacade};
use tracing::info;

/// 目标文档的来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Existing,
    Created,
}

/// 打开已存在的目标文档，不存在时以文件名（不含扩展名）新建。
pub fn open_or_create(path: &Path) -> Result<(Document, DocumentSource), PipelineError> {
    if path.exists() {
        let document = NativeFacade::new()
            .load(path)
            .map_err(PipelineError::Persistence)?;
        info!(path = %path.display(), objects = document.len(), "已打开目标文档");
        return Ok((document, DocumentSource::Existing));
    }

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Unnamed".to_string());
    info!(path = %path.display(), name = %name, "目标文档不存在，新建文档");
    Ok((Document::new(name), DocumentSource::Created))
}
