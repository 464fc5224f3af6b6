// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 负责: 会话构建、输入尺寸探测、Ultralytics 元数据解析、推理调用

use anyhow::{anyhow, Result};
use ndarray::{Array, ArrayViewD, IxDyn};
use once_cell::sync::Lazy;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use regex::Regex;

/// `{0: 'person', 1: 'bicycle'}` 形式的类别名条目
static NAMES_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).expect("valid names regex"));

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
}

/// 后端构建参数
#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    /// 动态输入时使用的 (height, width)
    pub image_size: (u32, u32),
    pub intra_threads: usize,
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    height: u32,
    width: u32,
    height_dynamic: bool,
    width_dynamic: bool,
    names: Option<Vec<String>>,
    output_channels: Option<usize>,
    author: Option<String>,
    version: Option<String>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        if !std::path::Path::new(&config.f).exists() {
            return Err(anyhow!("模型文件不存在: {}", config.f));
        }

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads.max(1))?;

        if let OrtEP::CUDA(device_id) = config.ep {
            let cuda = CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build();
            // CUDA 不可用时继续使用 CPU
            match builder.clone().with_execution_providers([cuda]) {
                Ok(b) => builder = b,
                Err(e) => tracing::warn!("⚠️ CUDA 执行设备注册失败, 回退到 CPU: {}", e),
            }
        }

        let session = builder.commit_from_file(&config.f)?;

        // 输入: [batch, 3, height, width], 非正数表示动态维度
        let input_dims: Vec<i64> = match session.inputs.first().map(|i| &i.input_type) {
            Some(ValueType::Tensor { shape, .. }) => shape.iter().copied().collect(),
            _ => Vec::new(),
        };
        let (height, height_dynamic) = Self::resolve_dim(input_dims.get(2), config.image_size.0);
        let (width, width_dynamic) = Self::resolve_dim(input_dims.get(3), config.image_size.1);

        // 输出: [batch, 4 + nc, anchors]
        let output_channels = match session.outputs.first().map(|o| &o.output_type) {
            Some(ValueType::Tensor { shape, .. }) => shape
                .get(1)
                .copied()
                .filter(|&c| c > 4)
                .map(|c| c as usize),
            _ => None,
        };

        let (names, author, version) = {
            let metadata = session.metadata()?;
            let names = metadata
                .custom("names")?
                .map(|raw| parse_names(&raw))
                .filter(|names| !names.is_empty());
            let author = metadata.custom("author")?;
            let version = metadata.custom("version")?;
            (names, author, version)
        };

        Ok(Self {
            session,
            ep: config.ep,
            height,
            width,
            height_dynamic,
            width_dynamic,
            names,
            output_channels,
            author,
            version,
        })
    }

    fn resolve_dim(dim: Option<&i64>, fallback: u32) -> (u32, bool) {
        match dim {
            Some(&d) if d > 0 => (d as u32, false),
            _ => (fallback, true),
        }
    }

    /// 执行一次前向推理, 返回第一个输出张量
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Array<f32, IxDyn>> {
        let t = std::time::Instant::now();
        let input = Tensor::from_array(xs)?;
        let outputs = self.session.run(ort::inputs![input])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let ys = ArrayViewD::from_shape(IxDyn(&dims), data)?.to_owned();
        if profile {
            tracing::debug!("[ORT H2D + Inference + D2H]: {:?}", t.elapsed());
        }
        Ok(ys)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_height_dynamic(&self) -> bool {
        self.height_dynamic
    }

    pub fn is_width_dynamic(&self) -> bool {
        self.width_dynamic
    }

    pub fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    /// 类别数: 优先元数据, 否则由输出通道数推断
    pub fn nc(&self) -> Option<u32> {
        match &self.names {
            Some(names) => Some(names.len() as u32),
            None => self.output_channels.map(|c| (c - 4) as u32),
        }
    }

    pub fn author(&self) -> Option<&String> {
        self.author.as_ref()
    }

    pub fn version(&self) -> Option<&String> {
        self.version.as_ref()
    }
}

/// 解析 Ultralytics 导出的 `names` 元数据
pub fn parse_names(raw: &str) -> Vec<String> {
    let mut entries: Vec<(usize, String)> = NAMES_ENTRY
        .captures_iter(raw)
        .filter_map(|cap| {
            let id = cap.get(1)?.as_str().parse::<usize>().ok()?;
            Some((id, cap.get(2)?.as_str().to_string()))
        })
        .collect();
    entries.sort_by_key(|(id, _)| *id);

    let len = entries.last().map(|(id, _)| id + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(|i| format!("class_{}", i)).collect();
    for (id, name) in entries {
        names[id] = name;
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ultralytics_names() {
        let names = parse_names("{0: 'person', 1: 'bicycle', 2: 'bird'}");
        assert_eq!(names, vec!["person", "bicycle", "bird"]);
    }

    #[test]
    fn parses_double_quoted_and_unordered_entries() {
        let names = parse_names(r#"{1: "sparrow", 0: "crow"}"#);
        assert_eq!(names, vec!["crow", "sparrow"]);
    }

    #[test]
    fn gaps_get_placeholder_names() {
        let names = parse_names("{0: 'a', 2: 'c'}");
        assert_eq!(names, vec!["a", "class_1", "c"]);
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse_names("not a dict").is_empty());
    }

    #[test]
    fn dynamic_dims_fall_back() {
        assert_eq!(OrtBackend::resolve_dim(Some(&-1), 640), (640, true));
        assert_eq!(OrtBackend::resolve_dim(None, 320), (320, true));
        assert_eq!(OrtBackend::resolve_dim(Some(&416), 640), (416, false));
    }
}
