use homeplan_core::store::StoreError;
use homeplan_engine::EngineError;
use homeplan_io::IoError;
use homeplan_viewer::ViewerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("存储访问失败: {0}")]
    Store(#[from] StoreError),
    #[error("文件读写失败: {0}")]
    Io(#[from] IoError),
    #[error("编辑会话出错: {0}")]
    Engine(#[from] EngineError),
    #[error("三维场景生成失败: {0}")]
    Viewer(#[from] ViewerError),
    #[error("无法解析日期 {0:?}，应为 YYYY-MM-DD")]
    InvalidDate(String),
    #[error("命令 {command} 执行失败: {message}")]
    Command { command: String, message: String },
}
