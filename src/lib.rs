// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
#![allow(clippy::type_complexity)]
pub mod app; // 界面无关的应用状态
pub mod config; // config.txt 配置读写 + 命令行参数
pub mod detection; // 检测包装器与画框
pub mod error; // 错误类型
pub mod export; // CSV 导出与趋势图
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod params; // 检测参数 JSON
pub mod recognition; // 数量密度滚动缓冲
pub mod renderer; // macroquad + egui 窗口

pub use crate::config::{AppConfig, Args};
pub use crate::error::{AppError, AppResult};
pub use crate::models::{Bbox, Detection, Model, OrtBackend, YOLOv8};
pub use crate::params::DetectorParams;

/// 按置信度降序排序后做非极大值抑制, 只在同类别之间比较
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].id() != xs[index].id() {
                continue;
            }
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 本地时间字符串, 用于结果文件命名
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!("%Y%m%d{}%H%M%S", delimiter);
    t_now.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_keeps_best_of_overlapping_boxes() {
        let mut boxes = vec![
            Bbox::new(10.0, 10.0, 100.0, 100.0, 0, 0.6),
            Bbox::new(12.0, 12.0, 100.0, 100.0, 0, 0.9),
            Bbox::new(300.0, 300.0, 50.0, 50.0, 0, 0.5),
        ];
        non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence(), 0.9);
        assert_eq!(boxes[1].confidence(), 0.5);
    }

    #[test]
    fn nms_does_not_suppress_across_classes() {
        let mut boxes = vec![
            Bbox::new(10.0, 10.0, 100.0, 100.0, 0, 0.8),
            Bbox::new(10.0, 10.0, 100.0, 100.0, 1, 0.7),
        ];
        non_max_suppression(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn time_string_uses_delimiter() {
        let s = gen_time_string("_");
        assert_eq!(s.len(), 15);
        assert_eq!(&s[8..9], "_");
    }
}
