// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置文件读写失败 {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("加载模型失败: {0}")]
    ModelLoad(String),
    #[error("检测失败: {0}")]
    Inference(String),
    #[error("没有检测数据可保存")]
    NoDetectionData,
    #[error("导出失败 {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("趋势图生成失败: {0}")]
    Chart(String),
    #[error("视频源错误: {0}")]
    Capture(String),
}

pub type AppResult<T> = Result<T, AppError>;
