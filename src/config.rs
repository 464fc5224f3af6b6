// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! config.txt 读写与命令行参数
//!
//! 文件格式为逐行 `key=value`:
//! ```text
//! model=resources/models/yolo11m.onnx
//! classes=bird,person
//! density=bird
//! ```

use clap::Parser;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

pub const DEFAULT_MODEL_PATH: &str = "resources/models/yolo11m.onnx";
pub const DEFAULT_CONFIG_FILE: &str = "config.txt";

/// 鸟类检测系统
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLO 鸟类检测与数量统计", long_about = None)]
pub struct Args {
    /// config.txt 路径
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// 检测参数 JSON 路径
    #[arg(short, long, default_value = "detector_params.json")]
    pub params: PathBuf,

    /// ONNX 模型路径, 覆盖 config.txt 中的 model
    #[arg(short, long)]
    pub model: Option<String>,

    /// 启动时打开的摄像头序号
    #[arg(long)]
    pub camera: Option<usize>,

    /// 启动时打开的视频文件
    #[arg(long, conflicts_with = "camera")]
    pub video: Option<PathBuf>,

    /// 检测记录与趋势图输出目录
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// 中文字体 (TTF/OTF), 用于界面与画面标注
    #[arg(long)]
    pub font: Option<PathBuf>,
}

/// config.txt 中保存的应用配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub model_path: String,
    pub selected_classes: BTreeSet<String>,
    pub density_classes: BTreeSet<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            selected_classes: BTreeSet::new(),
            density_classes: BTreeSet::new(),
        }
    }
}

impl AppConfig {
    /// 读取配置文件, 文件不存在时返回 `Ok(None)`
    pub fn load(path: impl AsRef<Path>) -> AppResult<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|source| AppError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(Self::parse(&text)))
    }

    /// 解析 `key=value` 文本, 未知键忽略
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        let mut density: Option<BTreeSet<String>> = None;

        for line in text.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "model" => config.model_path = value.to_string(),
                "classes" => config.selected_classes = split_classes(value),
                "density" => density = Some(split_classes(value)),
                _ => {}
            }
        }

        // 没有 density 行时密度图类别与识别类别一致
        config.density_classes = density.unwrap_or_else(|| config.selected_classes.clone());
        config
    }

    /// 序列化为文件内容, 集合按字典序输出
    pub fn render(&self) -> String {
        let mut out = format!("model={}\n", self.model_path);
        out.push_str(&format!("classes={}\n", join_classes(&self.selected_classes)));
        if !self.density_classes.is_empty() {
            out.push_str(&format!("density={}\n", join_classes(&self.density_classes)));
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        fs::write(path, self.render()).map_err(|source| AppError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }
}

fn split_classes(value: &str) -> BTreeSet<String> {
    if value.is_empty() {
        return BTreeSet::new();
    }
    value.split(',').map(str::to_string).collect()
}

fn join_classes(classes: &BTreeSet<String>) -> String {
    classes.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(dir.path().join("config.txt"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn directory_path_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(dir.path()),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn non_utf8_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        match AppConfig::load(&path) {
            Err(AppError::Config { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn density_defaults_to_selected_classes() {
        let config = AppConfig::parse("model=m.onnx\nclasses=bird,cat\n");
        assert_eq!(config.model_path, "m.onnx");
        assert_eq!(config.selected_classes, set(&["bird", "cat"]));
        assert_eq!(config.density_classes, set(&["bird", "cat"]));
    }

    #[test]
    fn explicit_density_line_wins() {
        let config = AppConfig::parse("classes=bird,cat\ndensity=bird\n");
        assert_eq!(config.density_classes, set(&["bird"]));
    }

    #[test]
    fn lines_are_trimmed_and_unknown_keys_ignored() {
        let config = AppConfig::parse("  model=a=b.onnx  \nfoo=bar\n\nclasses=\n");
        assert_eq!(config.model_path, "a=b.onnx");
        assert!(config.selected_classes.is_empty());
        assert!(config.density_classes.is_empty());
    }

    #[test]
    fn empty_file_keeps_defaults() {
        assert_eq!(AppConfig::parse(""), AppConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let config = AppConfig {
            model_path: "models/best.onnx".to_string(),
            selected_classes: set(&["sparrow", "crow", "bird"]),
            density_classes: set(&["crow"]),
        };
        config.save(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "model=models/best.onnx\nclasses=bird,crow,sparrow\ndensity=crow\n"
        );
        assert_eq!(AppConfig::load(&path).unwrap(), Some(config));
    }

    #[test]
    fn empty_density_is_not_written() {
        let config = AppConfig {
            model_path: "m.onnx".to_string(),
            selected_classes: set(&["bird"]),
            density_classes: BTreeSet::new(),
        };
        assert_eq!(config.render(), "model=m.onnx\nclasses=bird\n");
    }

    #[test]
    fn args_parse_overrides() {
        let args = Args::parse_from(["bird-detector", "--model", "x.onnx", "--camera", "1"]);
        assert_eq!(args.model.as_deref(), Some("x.onnx"));
        assert_eq!(args.camera, Some(1));
        assert_eq!(args.config, PathBuf::from("config.txt"));
        assert_eq!(args.results_dir, PathBuf::from("results"));
    }
}
