// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 数据导出
///
/// - csv:   快照导出、会话日志、记录读取
/// - trend: 退出时的数量趋势图
pub mod csv;
pub mod trend;

pub use csv::{export_snapshot, SessionLog, CSV_HEADER};
pub use trend::plot_trends;
