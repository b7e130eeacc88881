//! 命令行参数布局与运行结果输出。

use std::path::PathBuf;

use svgsketch_engine::pipeline::{PipelineRequest, RunReport};
use svgsketch_engine::pose::component_count;

use crate::errors::FrontendError;

pub const MIN_ARGUMENTS: usize = 4;
pub const USAGE: &str = "Usage: svgsketch [--config <path>] <target_document> <input_svg> <position x,y,z> <orientation x,y,z,w> [slice_name] [body_name]";

/// 位置参数。宿主可能在前面注入不定数量的参数，因此从末尾开始解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: PathBuf,
    pub drawing: PathBuf,
    pub position: String,
    pub orientation: String,
    pub slice: Option<String>,
    pub body: Option<String>,
}

impl Invocation {
    pub fn parse(args: &[String]) -> Result<Self, FrontendError> {
        if args.len() < MIN_ARGUMENTS {
            return Err(FrontendError::Usage { found: args.len() });
        }

        let orientation = orientation_slot(args).unwrap_or(args.len() - 1);
        let trailing = &args[orientation + 1..];
        Ok(Self {
            target: PathBuf::from(&args[orientation - 3]),
            drawing: PathBuf::from(&args[orientation - 2]),
            position: args[orientation - 1].clone(),
            orientation: args[orientation].clone(),
            slice: trailing.first().cloned(),
            body: trailing.get(1).cloned(),
        })
    }

    pub fn into_request(self) -> PipelineRequest {
        PipelineRequest {
            target: self.target,
            drawing: self.drawing,
            position: self.position,
            orientation: self.orientation,
            slice: self.slice,
            body: self.body,
        }
    }
}

/// 最后三个参数中，四分量且前一个为三分量的那一个即为姿态参数。
fn orientation_slot(args: &[String]) -> Option<usize> {
    let last = args.len() - 1;
    (last.saturating_sub(2)..=last)
        .rev()
        .filter(|&index| index >= MIN_ARGUMENTS - 1)
        .find(|&index| component_count(&args[index]) == 4 && component_count(&args[index - 1]) == 3)
}

/// 打印运行概览。
pub fn print_summary(report: &RunReport) {
    println!("导入对象: {}", report.imported);
    println!("生成草图: {}", report.sketches.len());
    println!("转换边数: {}", report.edges);
    if report.recompute_failures.is_empty() {
        println!("重算: 无错误");
    } else {
        println!("重算错误:");
        for failure in &report.recompute_failures {
            println!("  - {}: {}", failure.name, failure.message);
        }
    }
}
