//! 导入对象集合的确认。

use std::path::Path;

use svgsketch_core::document::{Document, ObjectId, ObjectSnapshot};
use svgsketch_io::ImportReport;
use tracing::{debug, warn};

use crate::errors::PipelineError;

/// 得到本次导入创建的对象，按创建顺序排列。
///
/// `Created` 的结果（包括空列表）直接采用；`NotReported` 时先重算，
/// 再用导入前快照 `before` 与当前快照求差集，差集为空视为导入失败。
pub fn reconcile(
    report: ImportReport,
    before: &ObjectSnapshot,
    document: &mut Document,
    drawing: &Path,
) -> Result<Vec<ObjectId>, PipelineError> {
    match report {
        ImportReport::Created(ids) => Ok(ids),
        ImportReport::NotReported => {
            warn!(path = %drawing.display(), "导入未报告创建的对象，改用快照比对");
            document.recompute();
            let after = document.snapshot();
            let created = after.created_since(before);
            debug!(before = before.len(), after = after.len(), created = created.len(), "快照比对完成");
            if created.is_empty() {
                return Err(PipelineError::ImportFailure {
                    path: drawing.to_path_buf(),
                });
            }
            Ok(created)
        }
    }
}

#[cfg(test)]
mod tests {
    use svgsketch_core::shape::Shape;

    use super::*;

    #[test]
    fn diff_returns_objects_added_after_snapshot() {
        let mut document = Document::new("diff");
        let a = document.add_feature("A", Shape::default());
        let b = document.add_feature("B", Shape::default());
        let before = document.snapshot();
        let c = document.add_feature("C", Shape::default());
        let d = document.add_feature("D", Shape::default());

        let created = reconcile(
            ImportReport::NotReported,
            &before,
            &mut document,
            Path::new("in.svg"),
        )
        .expect("diff");
        assert_eq!(created, vec![c, d]);
        assert!(!created.contains(&a) && !created.contains(&b));
    }

    #[test]
    fn empty_diff_is_an_import_failure() {
        let mut document = Document::new("diff");
        document.add_feature("A", Shape::default());
        let before = document.snapshot();

        let err = reconcile(
            ImportReport::NotReported,
            &before,
            &mut document,
            Path::new("in.svg"),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ImportFailure { .. }));
    }

    #[test]
    fn reported_empty_list_is_authoritative() {
        let mut document = Document::new("diff");
        let before = document.snapshot();
        // 即使文档中出现了新对象，也不做比对。
        document.add_feature("stray", Shape::default());

        let created = reconcile(
            ImportReport::Created(Vec::new()),
            &before,
            &mut document,
            Path::new("in.svg"),
        )
        .expect("reported");
        assert!(created.is_empty());
    }
}
