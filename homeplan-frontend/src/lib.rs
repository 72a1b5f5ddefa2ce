pub mod cli;
pub mod errors;
pub mod loader;
pub mod picking;

pub use cli::{DemoOptions, DemoReport};
use errors::FrontendError;
use homeplan_config::AppConfig;
use tracing::info;

/// 执行 CLI 演示并打印概览。
pub fn run_cli_demo(config: &AppConfig, options: &DemoOptions) -> Result<DemoReport, FrontendError> {
    info!(plan = ?options.plan, "启动 CLI 演示前端");
    let report = cli::run_demo(config, options)?;
    cli::print_report(&report);
    Ok(report)
}
