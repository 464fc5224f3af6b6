// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测参数 - 通过JSON文件调整

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 检测器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    // === 检测参数 ===
    pub conf_threshold: f32, // 检测置信度阈值
    pub iou_threshold: f32,  // NMS IOU阈值
    pub input_size: u32,     // 动态输入模型使用的推理尺寸

    // === 计数叠加层 ===
    pub crowd_threshold: u32, // 拥挤阈值 (数量)
    pub show_overlay: bool,   // 启动时是否显示计数叠加层

    // === 推理设备 ===
    pub intra_threads: usize,
    pub cuda: bool,
    pub device_id: i32,
    pub profile: bool, // 打印各阶段耗时
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            input_size: 640,

            crowd_threshold: 20,
            show_overlay: false,

            intra_threads: 4,
            cuda: false,
            device_id: 0,
            profile: false,
        }
    }
}

impl DetectorParams {
    /// 从JSON文件加载参数, 文件不存在时写出默认值
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(params) => {
                    tracing::info!("✅ 检测参数已从 {} 加载", path.display());
                    params
                }
                Err(e) => {
                    tracing::warn!("⚠️  检测参数解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("📝 检测参数文件不存在, 创建默认配置...");
                let params = Self::default();
                params.save(path);
                params
            }
        }
    }

    /// 保存参数到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    tracing::error!("❌ 保存检测参数失败: {}", e);
                } else {
                    tracing::info!("💾 检测参数已保存到 {}", path.display());
                }
            }
            Err(e) => tracing::error!("❌ 序列化检测参数失败: {}", e),
        }
    }

    /// 打印当前参数
    pub fn print_summary(&self) {
        tracing::info!(
            "🎛️  检测参数: 置信度 {:.2} | IOU {:.2} | 输入 {} | 拥挤阈值 {} | {}",
            self.conf_threshold,
            self.iou_threshold,
            self.input_size,
            self.crowd_threshold,
            if self.cuda { "CUDA" } else { "CPU" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector_params.json");
        let params = DetectorParams::load(&path);
        assert_eq!(params, DetectorParams::default());
        assert!(path.exists());
        assert_eq!(DetectorParams::load(&path), params);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, r#"{ "conf_threshold": 0.5, "crowd_threshold": 8 }"#).unwrap();
        let params = DetectorParams::load(&path);
        assert_eq!(params.conf_threshold, 0.5);
        assert_eq!(params.crowd_threshold, 8);
        assert_eq!(params.input_size, 640);
    }

    #[test]
    fn broken_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(DetectorParams::load(&path), DetectorParams::default());
    }
}
