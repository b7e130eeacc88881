//! 两阶段重算与错误汇总。

use svgsketch_core::document::{Document, RecomputeFailure};
use tracing::debug;

use crate::run_log::RunLog;

/// 先无条件重算以传播依赖状态，再以收集错误的方式重算一次。
/// 返回的失败列表不会中断运行。
pub fn recompute(document: &mut Document, log: &mut RunLog) -> Vec<RecomputeFailure> {
    log.status("Recomputing document");
    let executed = document.recompute();
    debug!(executed, "首轮重算完成");

    log.status("Checking for recompute errors");
    let failures = document.recompute_collect();
    if failures.is_empty() {
        log.status("Recompute completed successfully");
    } else {
        log.error("Recompute errors occurred:");
        for failure in &failures {
            log.error(format!("  {}: {}", failure.name, failure.message));
        }
    }
    failures
}
