// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 / YOLO11 检测模型
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{anyhow, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array, Axis, IxDyn};

use crate::models::{Detection, Model, OrtBackend, OrtConfig, OrtEP};
use crate::params::DetectorParams;
use crate::{non_max_suppression, Bbox};

const CXYWH_OFFSET: usize = 4;

/// YOLOv8 检测模型
pub struct YOLOv8 {
    engine: OrtBackend,
    nc: u32,
    height: u32,
    width: u32,
    conf: f32,
    iou: f32,
    names: Vec<String>,
    profile: bool,
}

impl YOLOv8 {
    /// 从模型路径与检测参数创建模型
    pub fn new(model_path: &str, params: &DetectorParams) -> Result<Self> {
        let ep = if params.cuda {
            OrtEP::CUDA(params.device_id)
        } else {
            OrtEP::CPU
        };

        let engine = OrtBackend::build(OrtConfig {
            f: model_path.to_string(),
            ep,
            image_size: (params.input_size, params.input_size),
            intra_threads: params.intra_threads,
        })?;

        let nc = engine
            .nc()
            .ok_or_else(|| anyhow!("无法从模型获取类别数: {}", model_path))?;
        let names = engine
            .names()
            .unwrap_or_else(|| (0..nc).map(|i| format!("class_{}", i)).collect());

        Ok(Self {
            height: engine.height(),
            width: engine.width(),
            engine,
            nc,
            conf: params.conf_threshold,
            iou: params.iou_threshold,
            names,
            profile: params.profile,
        })
    }

    fn scale_wh(&self, w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    /// 等比缩放到输入尺寸, 右下方以灰色填充, 输出 NCHW
    pub fn preprocess(&self, x: &RgbImage) -> Result<Array<f32, IxDyn>> {
        let (w_in, h_in) = (self.width as usize, self.height as usize);
        let mut ys = Array::ones((1, 3, h_in, w_in)).into_dyn();
        ys.fill(144.0 / 255.0);

        let (_, w_new, h_new) = self.scale_wh(
            x.width() as f32,
            x.height() as f32,
            self.width as f32,
            self.height as f32,
        );
        let img = image::imageops::resize(
            x,
            (w_new as u32).max(1),
            (h_new as u32).max(1),
            FilterType::Triangle,
        );

        for (x, y, rgb) in img.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            if x >= w_in || y >= h_in {
                continue;
            }
            let [r, g, b] = rgb.0;
            ys[[0, 0, y, x]] = (r as f32) / 255.0;
            ys[[0, 1, y, x]] = (g as f32) / 255.0;
            ys[[0, 2, y, x]] = (b as f32) / 255.0;
        }

        Ok(ys)
    }

    pub fn postprocess(
        &self,
        preds: &Array<f32, IxDyn>,
        width_original: f32,
        height_original: f32,
    ) -> Result<Vec<Detection>> {
        self.postprocessor()
            .postprocess(preds, &self.names, width_original, height_original)
    }

    fn postprocessor(&self) -> YOLOv8Postprocessor {
        YOLOv8Postprocessor::new(YOLOv8Config {
            nc: self.nc as usize,
            width: self.width,
            height: self.height,
            conf: self.conf,
            iou: self.iou,
        })
    }

    pub fn run(&mut self, x: &RgbImage) -> Result<Vec<Detection>> {
        let t_pre = std::time::Instant::now();
        let xs = self.preprocess(x)?;
        if self.profile {
            tracing::debug!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let t_run = std::time::Instant::now();
        let ys = self.engine.run(xs, self.profile)?;
        if self.profile {
            tracing::debug!("[Model Inference]: {:?}", t_run.elapsed());
        }

        let t_post = std::time::Instant::now();
        let ys = self.postprocess(&ys, x.width() as f32, x.height() as f32)?;
        if self.profile {
            tracing::debug!("[Model Postprocess]: {:?}", t_post.elapsed());
        }

        Ok(ys)
    }
}

impl Model for YOLOv8 {
    fn forward(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        self.run(image)
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn summary(&self) {
        tracing::info!(
            "\nSummary:\n\
            > EP: {:?} {}\n\
            > Model: {}\n\
            > Height: {} ({}), Width: {} ({})\n\
            > nc: {}, conf: {}, iou: {}",
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                "(May still fall back to CPU)"
            },
            match self.engine.author().zip(self.engine.version()) {
                Some((author, ver)) => format!("{} {}", author, ver),
                None => String::from("unknown"),
            },
            self.height,
            if self.engine.is_height_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.width,
            if self.engine.is_width_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.nc,
            self.conf,
            self.iou,
        );
    }

    fn set_conf(&mut self, val: f32) {
        self.conf = val;
    }

    fn set_iou(&mut self, val: f32) {
        self.iou = val;
    }
}

/// 后处理参数
#[derive(Debug, Clone, Copy)]
pub struct YOLOv8Config {
    pub nc: usize,
    pub width: u32,
    pub height: u32,
    pub conf: f32,
    pub iou: f32,
}

/// YOLOv8 后处理器, 与推理会话解耦
pub struct YOLOv8Postprocessor {
    config: YOLOv8Config,
}

impl YOLOv8Postprocessor {
    pub fn new(config: YOLOv8Config) -> Self {
        Self { config }
    }

    /// 解码 `[1, 4 + nc, anchors]` 输出并还原到原图坐标
    pub fn postprocess(
        &self,
        preds: &Array<f32, IxDyn>,
        names: &[String],
        width_original: f32,
        height_original: f32,
    ) -> Result<Vec<Detection>> {
        if preds.ndim() != 3 {
            return Err(anyhow!("模型输出维度异常: {:?}", preds.shape()));
        }
        let nc = self.config.nc;
        if preds.shape()[1] < CXYWH_OFFSET + nc {
            return Err(anyhow!(
                "模型输出通道数 {} 小于 4 + nc ({})",
                preds.shape()[1],
                nc
            ));
        }

        let ratio = (self.config.width as f32 / width_original)
            .min(self.config.height as f32 / height_original);

        let mut data: Vec<Bbox> = Vec::new();
        let anchor = preds.index_axis(Axis(0), 0);
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };

            if confidence < self.config.conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let x1 = (cx - w / 2.).clamp(0.0, width_original);
            let y1 = (cy - h / 2.).clamp(0.0, height_original);
            let x2 = (cx + w / 2.).clamp(0.0, width_original);
            let y2 = (cy + h / 2.).clamp(0.0, height_original);
            data.push(Bbox::from_xyxy(x1, y1, x2, y2, id, confidence));
        }

        non_max_suppression(&mut data, self.config.iou);

        Ok(data
            .into_iter()
            .map(|bbox| {
                let name = names
                    .get(bbox.id())
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", bbox.id()));
                Detection::new(name, bbox)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn processor(conf: f32) -> YOLOv8Postprocessor {
        YOLOv8Postprocessor::new(YOLOv8Config {
            nc: 2,
            width: 640,
            height: 640,
            conf,
            iou: 0.45,
        })
    }

    fn names() -> Vec<String> {
        vec!["sparrow".to_string(), "crow".to_string()]
    }

    /// 以 (cx, cy, w, h, score0, score1) 列构造模型输出
    fn preds(anchors: &[[f32; 6]]) -> Array<f32, IxDyn> {
        let mut a = Array3::<f32>::zeros((1, 6, anchors.len()));
        for (i, anchor) in anchors.iter().enumerate() {
            for (c, v) in anchor.iter().enumerate() {
                a[[0, c, i]] = *v;
            }
        }
        a.into_dyn()
    }

    #[test]
    fn decodes_and_rescales_to_original_frame() {
        // 1280x1280 原图 → 640 输入, 缩放比 0.5
        let ys = preds(&[[320.0, 320.0, 100.0, 50.0, 0.1, 0.9]]);
        let dets = processor(0.25)
            .postprocess(&ys, &names(), 1280.0, 1280.0)
            .unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "crow");
        assert_eq!(dets[0].class_id(), 1);
        assert!((dets[0].bbox.xmin() - 540.0).abs() < 1e-3);
        assert!((dets[0].bbox.ymin() - 590.0).abs() < 1e-3);
        assert!((dets[0].bbox.width() - 200.0).abs() < 1e-3);
        assert!((dets[0].bbox.height() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn filters_low_confidence() {
        let ys = preds(&[[100.0, 100.0, 10.0, 10.0, 0.2, 0.1]]);
        let dets = processor(0.25)
            .postprocess(&ys, &names(), 640.0, 640.0)
            .unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn overlapping_same_class_boxes_are_merged() {
        let ys = preds(&[
            [100.0, 100.0, 50.0, 50.0, 0.8, 0.0],
            [102.0, 101.0, 50.0, 50.0, 0.9, 0.0],
            [400.0, 400.0, 50.0, 50.0, 0.7, 0.0],
        ]);
        let dets = processor(0.25)
            .postprocess(&ys, &names(), 640.0, 640.0)
            .unwrap();
        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn boxes_are_clamped_to_frame() {
        let ys = preds(&[[5.0, 5.0, 40.0, 40.0, 0.9, 0.0]]);
        let dets = processor(0.25)
            .postprocess(&ys, &names(), 640.0, 640.0)
            .unwrap();
        assert_eq!(dets[0].bbox.xmin(), 0.0);
        assert_eq!(dets[0].bbox.ymin(), 0.0);
        assert!((dets[0].bbox.xmax() - 25.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_wrong_rank() {
        let ys = Array::<f32, _>::zeros(IxDyn(&[6, 3]));
        assert!(processor(0.25)
            .postprocess(&ys, &names(), 640.0, 640.0)
            .is_err());
    }
}
