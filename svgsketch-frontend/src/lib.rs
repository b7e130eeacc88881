pub mod cli;
pub mod errors;
pub mod loader;

use std::error::Error as _;

use errors::FrontendError;
use svgsketch_config::{AppConfig, SplineStrategyName};
use svgsketch_engine::convert::{ConversionOptions, SplineStrategy};
use svgsketch_engine::pipeline::{Pipeline, PipelineOptions, RunReport};
use svgsketch_engine::run_log::RunLog;
use svgsketch_io::{NativeFacade, SvgImporter};
use tracing::{info, warn};

use crate::cli::Invocation;
use crate::loader::open_or_create;

/// 一次运行的最终结果。
#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub report: Option<RunReport>,
    pub error: Option<FrontendError>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// 由配置得到流程选项。
pub fn pipeline_options(config: &AppConfig) -> PipelineOptions {
    let spline_strategy = match config.conversion.spline_strategy {
        SplineStrategyName::Reconstruct => SplineStrategy::Reconstruct,
        SplineStrategyName::Discretize => SplineStrategy::Discretize {
            segments: config.conversion.discretize_segments.max(1),
        },
    };
    PipelineOptions {
        conversion: ConversionOptions {
            spline_strategy,
            rotate_circle_axis: config.conversion.rotate_circle_axis,
        },
        sketch_prefix: config.conversion.sketch_prefix.clone(),
    }
}

/// 执行一次导入。所有错误在此汇总：写入运行日志（含完整错误链），并换算为退出码。
pub fn run(args: &[String], config: &AppConfig) -> RunOutcome {
    let mut log = match RunLog::create(&config.logging.file) {
        Ok(log) => log,
        Err(err) => {
            warn!(error = %err, "无法创建运行日志文件，仅输出到控制台");
            RunLog::in_memory()
        }
    };
    log.status("Script started");

    let result = execute(args, config, &mut log);
    let outcome = match result {
        Ok(report) => {
            log.status("Script execution completed successfully");
            cli::print_summary(&report);
            RunOutcome {
                exit_code: 0,
                report: Some(report),
                error: None,
            }
        }
        Err(err) => {
            log.error(format!("An error occurred: {err}"));
            log.error("Traceback:");
            let mut source = err.source();
            while let Some(cause) = source {
                log.error(format!("  caused by: {cause}"));
                source = cause.source();
            }
            let exit_code = if config.exit.always_succeed {
                0
            } else {
                err.exit_code()
            };
            RunOutcome {
                exit_code,
                report: None,
                error: Some(err),
            }
        }
    };

    log.status("Script ended");
    outcome
}

fn execute(
    args: &[String],
    config: &AppConfig,
    log: &mut RunLog,
) -> Result<RunReport, FrontendError> {
    log.status("Checking arguments");
    let invocation = Invocation::parse(args)?;

    log.status(format!("Opening document: {}", invocation.target.display()));
    let (mut document, source) = open_or_create(&invocation.target)?;
    info!(?source, name = document.name(), "目标文档就绪");

    let importer = SvgImporter::with_reporting(config.import.report_created);
    let store = NativeFacade::new();
    let pipeline = Pipeline::new(&importer, &store, pipeline_options(config));
    let report = pipeline.run(&mut document, &invocation.into_request(), log)?;

    log.status("Closing document");
    Ok(report)
}
