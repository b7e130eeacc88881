//! SVG 到草图的完整转换流程。

use std::path::PathBuf;

use svgsketch_core::document::{
    ContainerKind, Document, DocumentError, ObjectId, ObjectKind, RecomputeFailure,
};
use svgsketch_io::{DocumentSaver, VectorImporter, parse_vector_document};
use tracing::{debug, info};

use crate::convert::{ConversionOptions, GeometryConverter};
use crate::errors::PipelineError;
use crate::pose::Pose;
use crate::reconcile::reconcile;
use crate::recompute::recompute;
use crate::run_log::RunLog;

pub const REFERENCE_FRAME_NAME: &str = "ReferenceFrame";
pub const DEFAULT_SKETCH_PREFIX: &str = "SVGSketch";

/// 一次运行的输入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub target: PathBuf,
    pub drawing: PathBuf,
    pub position: String,
    pub orientation: String,
    pub slice: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub conversion: ConversionOptions,
    pub sketch_prefix: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            conversion: ConversionOptions::default(),
            sketch_prefix: DEFAULT_SKETCH_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub reference_frame: ObjectId,
    /// 确认后的导入对象数量。
    pub imported: usize,
    pub sketches: Vec<ObjectId>,
    /// 已转换的源边总数。
    pub edges: usize,
    pub recompute_failures: Vec<RecomputeFailure>,
}

pub struct Pipeline<'a> {
    importer: &'a dyn VectorImporter,
    saver: &'a dyn DocumentSaver,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        importer: &'a dyn VectorImporter,
        saver: &'a dyn DocumentSaver,
        options: PipelineOptions,
    ) -> Self {
        Self {
            importer,
            saver,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// 在 `document` 上执行一次导入并保存到 `request.target`。
    ///
    /// 重算错误只记录，不影响保存。
    pub fn run(
        &self,
        document: &mut Document,
        request: &PipelineRequest,
        log: &mut RunLog,
    ) -> Result<RunReport, PipelineError> {
        if !request.drawing.is_file() {
            return Err(PipelineError::Argument(format!(
                "input drawing {} does not exist",
                request.drawing.display()
            )));
        }
        let pose = Pose::parse(&request.position, &request.orientation)?;
        let drawing = parse_vector_document(&request.drawing)?;
        debug!(
            width = drawing.width,
            height = drawing.height,
            unit = drawing.unit.suffix(),
            "图纸尺寸"
        );

        log.status("Creating reference frame");
        let placement = pose.placement();
        let frame = document.add_reference_frame(REFERENCE_FRAME_NAME, placement);
        let before = document.snapshot();

        log.status(format!("Importing SVG: {}", request.drawing.display()));
        let report = self
            .importer
            .insert(&request.drawing, document)
            .map_err(PipelineError::Import)?;
        let imported = reconcile(report, &before, document, &request.drawing)?;
        log.status(format!("Imported {} objects from SVG", imported.len()));

        let container = resolve_containers(document, request, log)?;
        let converter = GeometryConverter::new(&drawing, placement, self.options.conversion);

        let mut sketches = Vec::new();
        let mut edges = 0;
        for (index, id) in imported.iter().enumerate() {
            log.status(format!("Processing object {}/{}", index + 1, imported.len()));
            let Some(object) = document.object(*id) else {
                log.status(format!("  Object {id} no longer exists, skipping"));
                continue;
            };
            let Some(shape) = object.shape().cloned() else {
                log.status(format!(
                    "  Object {} ({}) has no shape, skipping",
                    object.name,
                    object.kind.type_name()
                ));
                continue;
            };
            let source_name = object.name.clone();

            let converted = converter.convert_shape(&shape, log);
            let name = format!("{}_{}", self.options.sketch_prefix, index + 1);
            let sketch_id = document.add_sketch(&name, placement, Some(frame));
            let sketch = document.sketch_mut(sketch_id)?;
            for entry in converted.entries {
                sketch.add_entry(entry);
            }
            if let Some(container) = container {
                document.add_to_container(container, sketch_id)?;
            }
            log.status(format!("  Added {} edges to sketch", converted.edge_count));

            log.status(format!("  Removing original imported object: {source_name}"));
            document.remove_object(*id)?;

            sketches.push(sketch_id);
            edges += converted.edge_count;
        }

        let recompute_failures = recompute(document, log);

        log.status(format!("Saving document to: {}", request.target.display()));
        self.saver
            .save(document, &request.target)
            .map_err(PipelineError::Persistence)?;
        info!(
            sketches = sketches.len(),
            edges,
            failures = recompute_failures.len(),
            "转换完成"
        );

        Ok(RunReport {
            reference_frame: frame,
            imported: imported.len(),
            sketches,
            edges,
            recompute_failures,
        })
    }
}

/// 草图的目标容器：有切片名时为切片（位于实体内），否则为实体，都没有则为根。
fn resolve_containers(
    document: &mut Document,
    request: &PipelineRequest,
    log: &mut RunLog,
) -> Result<Option<ObjectId>, PipelineError> {
    let body = match request.body.as_deref() {
        Some(name) => Some(find_or_create(document, name, ContainerKind::Body, log)?),
        None => None,
    };
    let slice = match request.slice.as_deref() {
        Some(name) => {
            let slice = find_or_create(document, name, ContainerKind::Slice, log)?;
            if let Some(body) = body {
                let parent = document.object(slice).and_then(|object| object.parent);
                if parent != Some(body) {
                    document.add_to_container(body, slice)?;
                }
            }
            Some(slice)
        }
        None => None,
    };
    Ok(slice.or(body))
}

fn find_or_create(
    document: &mut Document,
    name: &str,
    kind: ContainerKind,
    log: &mut RunLog,
) -> Result<ObjectId, PipelineError> {
    if let Some(existing) = document.object_by_name(name) {
        return match existing.kind {
            ObjectKind::Container(_) => Ok(existing.id),
            _ => Err(DocumentError::NotAContainer(name.to_string()).into()),
        };
    }
    log.status(format!("Creating {kind:?} container: {name}"));
    Ok(document.add_container(name, kind))
}
