// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// # 架构说明
///
/// - **OrtBackend**: ONNX Runtime 会话封装 (加载、输入尺寸、类别名元数据、推理)
/// - **YOLOv8**: 预处理 → 推理 → 后处理, 同时适用于 YOLOv8 / YOLO11 检测模型导出
///
/// ## Model Trait
/// 界面层只依赖此 trait, 单帧图片进, 检测框出:
/// ```text
/// RgbImage → forward → Vec<Detection>
/// ```
use anyhow::Result;
use image::RgbImage;

pub mod ort_backend;
pub mod yolov8;

pub use ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use yolov8::YOLOv8;

/// 统一的检测模型接口
pub trait Model {
    /// 对一帧图像做完整推理, 返回原图坐标系下的检测结果
    fn forward(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// 模型全部类别名, 下标即类别ID
    fn names(&self) -> &[String];

    /// 打印模型信息
    fn summary(&self);

    fn set_conf(&mut self, val: f32);

    fn set_iou(&mut self, val: f32);
}

/// 单个检测结果: 类别名 + 边界框
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub bbox: Bbox,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, bbox: Bbox) -> Self {
        Self {
            class_name: class_name.into(),
            bbox,
        }
    }

    pub fn class_id(&self) -> usize {
        self.bbox.id()
    }

    pub fn confidence(&self) -> f32 {
        self.bbox.confidence()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32, id: usize, confidence: f32) -> Self {
        Self::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0), id, confidence)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        let b = Bbox::new(20.0, 20.0, 10.0, 10.0, 0, 0.9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn half_overlap() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.9);
        let b = Bbox::new(5.0, 0.0, 10.0, 10.0, 0, 0.9);
        // 交集 50, 并集 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn from_xyxy_never_yields_negative_size() {
        let b = Bbox::from_xyxy(10.0, 10.0, 5.0, 20.0, 2, 0.4);
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 10.0);
        assert_eq!(b.id(), 2);
    }
}
