// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测器 (ObjectDetector)
//! 职责: 模型推理 → 按识别类别过滤 → 画框 → 更新计数

use std::collections::BTreeSet;
use std::sync::Arc;

use ab_glyph::FontVec;
use image::RgbImage;

use super::overlay;
use super::types::{CountStats, DetectionInfo, FrameReport, DEFAULT_CROWD_THRESHOLD};
use crate::error::{AppError, AppResult};
use crate::models::Model;

pub struct ObjectDetector {
    model: Box<dyn Model>,
    pub selected_classes: BTreeSet<String>,
    pub density_classes: BTreeSet<String>, // 计入密度图的类别
    pub total_objects: usize,
    pub current_detection_info: Vec<DetectionInfo>,

    // 计数叠加层
    pub crowd_threshold: u32,
    pub show_overlay: bool,
    stats: CountStats,

    font: Option<Arc<FontVec>>,
}

impl ObjectDetector {
    pub fn new(model: Box<dyn Model>) -> Self {
        Self {
            model,
            selected_classes: BTreeSet::new(),
            density_classes: BTreeSet::new(),
            total_objects: 0,
            current_detection_info: Vec::new(),
            crowd_threshold: DEFAULT_CROWD_THRESHOLD,
            show_overlay: false,
            stats: CountStats::default(),
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<Arc<FontVec>>) -> Self {
        self.font = font;
        self
    }

    pub fn model_mut(&mut self) -> &mut dyn Model {
        self.model.as_mut()
    }

    pub fn stats(&self) -> &CountStats {
        &self.stats
    }

    /// 处理一帧: 推理并在原帧上画出识别类别的检测结果
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> AppResult<FrameReport> {
        let detections = self
            .model
            .forward(frame)
            .map_err(|e| AppError::Inference(e.to_string()))?;

        let mut report = FrameReport::default();
        let font = self.font.as_deref();

        for det in detections {
            if !self.selected_classes.contains(&det.class_name) {
                continue;
            }
            match report
                .class_counts
                .iter_mut()
                .find(|(name, _)| *name == det.class_name)
            {
                Some((_, n)) => *n += 1,
                None => report.class_counts.push((det.class_name.clone(), 1)),
            }
            overlay::draw_detection(frame, font, &det);
            report.detections.push(det);
        }

        if let Some(label) = report.summary_label() {
            overlay::draw_summary(frame, font, &label);
        }

        report.total = report.class_counts.iter().map(|(_, n)| n).sum();
        self.total_objects = report.total;
        self.current_detection_info = report
            .detections
            .iter()
            .map(|d| DetectionInfo {
                class_name: d.class_name.clone(),
                confidence: d.confidence(),
            })
            .collect();

        self.stats.push(report.total);
        if self.show_overlay {
            overlay::draw_counting_bar(frame, font, report.total, self.crowd_threshold);
            overlay::draw_threshold_bar(frame, font, report.total, self.crowd_threshold);
            overlay::draw_statistics_panel(frame, font, &self.stats, self.crowd_threshold);
        }

        Ok(report)
    }

    /// 停止检测时清空当前帧信息
    pub fn clear(&mut self) {
        self.current_detection_info.clear();
        self.total_objects = 0;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Detection;
    use crate::Bbox;
    use anyhow::{anyhow, Result};

    /// 返回固定检测结果的模型
    pub(crate) struct FakeModel {
        pub names: Vec<String>,
        pub detections: Vec<Detection>,
        pub fail: bool,
    }

    impl FakeModel {
        pub(crate) fn new(names: &[&str], detections: Vec<Detection>) -> Self {
            Self {
                names: names.iter().map(|s| s.to_string()).collect(),
                detections,
                fail: false,
            }
        }
    }

    impl Model for FakeModel {
        fn forward(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
            if self.fail {
                return Err(anyhow!("boom"));
            }
            Ok(self.detections.clone())
        }

        fn names(&self) -> &[String] {
            &self.names
        }

        fn summary(&self) {}

        fn set_conf(&mut self, _val: f32) {}

        fn set_iou(&mut self, _val: f32) {}
    }

    pub(crate) fn det(name: &str, id: usize, x: f32) -> Detection {
        Detection::new(name, Bbox::new(x, 10.0, 20.0, 20.0, id, 0.8))
    }

    fn detector() -> ObjectDetector {
        let model = FakeModel::new(
            &["bird", "cat", "dog"],
            vec![
                det("bird", 0, 10.0),
                det("cat", 1, 40.0),
                det("bird", 0, 70.0),
                det("dog", 2, 100.0),
            ],
        );
        let mut detector = ObjectDetector::new(Box::new(model));
        detector.selected_classes = ["bird", "cat"].iter().map(|s| s.to_string()).collect();
        detector
    }

    #[test]
    fn keeps_only_selected_classes() {
        let mut detector = detector();
        let mut frame = RgbImage::new(160, 80);
        let report = detector.process_frame(&mut frame).unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(
            report.class_counts,
            vec![("bird".to_string(), 2), ("cat".to_string(), 1)]
        );
        assert_eq!(detector.total_objects, 3);
        assert_eq!(detector.current_detection_info.len(), 3);
        // dog 未被绘制
        assert_eq!(*frame.get_pixel(100, 10), image::Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(10, 10), overlay::BOX_COLOR);
    }

    #[test]
    fn empty_selection_counts_nothing() {
        let mut detector = detector();
        detector.selected_classes.clear();
        let mut frame = RgbImage::new(160, 80);
        let report = detector.process_frame(&mut frame).unwrap();
        assert_eq!(report.total, 0);
        assert!(report.summary_label().is_none());
        assert!(detector.current_detection_info.is_empty());
    }

    #[test]
    fn model_errors_become_inference_errors() {
        let mut model = FakeModel::new(&["bird"], Vec::new());
        model.fail = true;
        let mut detector = ObjectDetector::new(Box::new(model));
        let mut frame = RgbImage::new(8, 8);
        assert!(matches!(
            detector.process_frame(&mut frame),
            Err(AppError::Inference(_))
        ));
    }

    #[test]
    fn clear_resets_counts() {
        let mut detector = detector();
        let mut frame = RgbImage::new(160, 80);
        detector.process_frame(&mut frame).unwrap();
        detector.clear();
        assert_eq!(detector.total_objects, 0);
        assert!(detector.current_detection_info.is_empty());
        assert_eq!(detector.stats().len(), 1);
    }
}
