// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// 运行在界面线程, 每帧一次
/// - ObjectDetector: 推理 + 类别过滤 + 计数
/// - overlay:        检测框与计数叠加层
pub mod detector;
pub mod overlay;
pub mod types;

pub use detector::ObjectDetector;
pub use types::{CountStats, CrowdStatus, DetectionInfo, FrameReport};
