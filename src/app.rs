// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 界面无关的应用状态
//!
//! 窗口层只负责绘制和收集输入, 所有状态变化都经过这里:
//! ```text
//! CaptureEvent → handle_capture_event → process → (检测 + 计数 + 密度缓冲 + 会话日志)
//! 设置/密度对话框 → apply_settings / apply_density → config.txt
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ab_glyph::FontVec;
use image::RgbImage;

use crate::config::{AppConfig, DEFAULT_MODEL_PATH};
use crate::detection::{FrameReport, ObjectDetector};
use crate::error::{AppError, AppResult};
use crate::export::{self, SessionLog};
use crate::input::{CaptureEvent, VideoSource};
use crate::models::Model;
use crate::params::DetectorParams;
use crate::recognition::RecognitionLog;

/// 按路径加载模型
pub type ModelLoader = Box<dyn Fn(&str, &DetectorParams) -> anyhow::Result<Box<dyn Model>>>;

pub struct AppState {
    pub status: String,
    pub fps: f32,
    last_frame_time: Option<Instant>,
    pub is_detecting: bool,

    pub all_classes: Vec<String>,
    pub selected_classes: BTreeSet<String>,
    pub density_classes: BTreeSet<String>,
    pub model_path: Option<String>,
    // 写入 config.txt 的模型路径, 加载失败时也保留用户的选择
    configured_model: Option<String>,
    default_model_path: PathBuf,

    detector: Option<ObjectDetector>,
    pub recognition: RecognitionLog,
    session_log: Option<SessionLog>,
    last_report: FrameReport,

    pub params: DetectorParams,
    config_path: PathBuf,
    params_path: PathBuf,
    results_dir: PathBuf,
    loader: ModelLoader,
    font: Option<Arc<FontVec>>,
}

impl AppState {
    pub fn new(
        config_path: impl Into<PathBuf>,
        params_path: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
        params: DetectorParams,
        loader: ModelLoader,
    ) -> Self {
        Self {
            status: "系统就绪".to_string(),
            fps: 0.0,
            last_frame_time: None,
            is_detecting: false,
            all_classes: Vec::new(),
            selected_classes: BTreeSet::new(),
            density_classes: BTreeSet::new(),
            model_path: None,
            configured_model: None,
            default_model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            detector: None,
            recognition: RecognitionLog::new(),
            session_log: None,
            last_report: FrameReport::default(),
            params,
            config_path: config_path.into(),
            params_path: params_path.into(),
            results_dir: results_dir.into(),
            loader,
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<Arc<FontVec>>) -> Self {
        self.font = font;
        self
    }

    /// 没有可用配置时尝试加载的模型
    pub fn with_default_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_model_path = path.into();
        self
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        tracing::info!("📢 {}", self.status);
    }

    fn sync_detector(&mut self) {
        if let Some(det) = self.detector.as_mut() {
            det.selected_classes = self.selected_classes.clone();
            det.density_classes = self.density_classes.clone();
            det.crowd_threshold = self.params.crowd_threshold;
            det.show_overlay = self.params.show_overlay;
        }
    }

    /// 会话开始时创建检测记录文件
    pub fn start_session(&mut self) {
        match SessionLog::create(&self.results_dir) {
            Ok(log) => self.session_log = Some(log),
            Err(e) => tracing::warn!("⚠️  无法创建检测记录文件: {}", e),
        }
    }

    pub fn session_log(&self) -> Option<&SessionLog> {
        self.session_log.as_ref()
    }

    /// 应用启动时读取的 config.txt
    pub fn apply_config(
        &mut self,
        loaded: AppResult<Option<AppConfig>>,
        model_override: Option<String>,
    ) {
        let config = match loaded {
            Ok(Some(config)) => config,
            Ok(None) => {
                self.load_fallback_model(model_override);
                self.set_status("未找到config.txt文件，请进行设置");
                return;
            }
            Err(e) => {
                tracing::warn!("⚠️  {}", e);
                self.load_fallback_model(model_override);
                self.set_status(format!("读取config.txt失败: {}", e));
                return;
            }
        };

        let model_path = model_override.unwrap_or_else(|| config.model_path.clone());
        self.configured_model = Some(model_path.clone());
        if Path::new(&model_path).exists() {
            self.load_model_and_classes(&model_path);
            if self.model_path.is_some() {
                let name = file_name(&model_path);
                self.set_status(format!("已加载模型: {}", name));
            }
        } else {
            self.set_status("配置中指定的模型文件不存在");
        }

        if !config.selected_classes.is_empty() {
            self.selected_classes = config.selected_classes;
            self.density_classes = if config.density_classes.is_empty() {
                self.selected_classes.clone()
            } else {
                config.density_classes
            };
        }
        self.sync_detector();
    }

    /// 无配置时: 命令行指定的模型, 否则存在的默认模型
    fn load_fallback_model(&mut self, model_override: Option<String>) {
        let path = match model_override {
            Some(path) => path,
            None if self.default_model_path.exists() => {
                self.default_model_path.to_string_lossy().to_string()
            }
            None => {
                tracing::info!("ℹ️  默认模型不存在: {}", self.default_model_path.display());
                return;
            }
        };
        self.load_model_and_classes(&path);
    }

    /// 加载模型并读取类别, 失败时清空模型相关状态
    pub fn load_model_and_classes(&mut self, model_path: &str) {
        // 先释放旧模型
        self.detector = None;

        match (self.loader)(model_path, &self.params) {
            Ok(model) => {
                model.summary();
                self.all_classes = model.names().to_vec();
                if self.selected_classes.is_empty() {
                    self.selected_classes = self.all_classes.iter().cloned().collect();
                }
                if self.density_classes.is_empty() {
                    self.density_classes = self.all_classes.iter().cloned().collect();
                }
                self.detector = Some(ObjectDetector::new(model).with_font(self.font.clone()));
                self.model_path = Some(model_path.to_string());
                self.sync_detector();
                self.set_status(format!("成功加载模型: {}", file_name(model_path)));
            }
            Err(e) => {
                tracing::error!("❌ 加载模型失败: {:#}", e);
                self.set_status(format!("{}", AppError::ModelLoad(e.to_string())));
                self.model_path = None;
                self.all_classes.clear();
                self.selected_classes.clear();
                self.density_classes.clear();
            }
        }
    }

    /// 设置对话框选择模型后读取其类别, 不替换当前模型
    pub fn model_classes(&self, model_path: &str) -> AppResult<Vec<String>> {
        if self.model_path.as_deref() == Some(model_path) && !self.all_classes.is_empty() {
            return Ok(self.all_classes.clone());
        }
        let model = (self.loader)(model_path, &self.params)
            .map_err(|e| AppError::ModelLoad(e.to_string()))?;
        Ok(model.names().to_vec())
    }

    pub fn has_model(&self) -> bool {
        self.detector.is_some()
    }

    /// 设置对话框确认: 重新加载模型, 更新识别类别并保存配置
    pub fn apply_settings(&mut self, model_path: &str, selected: BTreeSet<String>) {
        self.load_model_and_classes(model_path);
        self.selected_classes = selected;
        if self.density_classes.is_empty() {
            self.density_classes = self.selected_classes.clone();
        }
        self.sync_detector();
        self.configured_model = Some(model_path.to_string());
        self.save_config(model_path);
    }

    /// 密度图对话框确认
    pub fn apply_density(&mut self, density: BTreeSet<String>) {
        self.density_classes = density;
        self.sync_detector();
        let model_path = self
            .configured_model
            .clone()
            .or_else(|| self.model_path.clone())
            .unwrap_or_default();
        self.save_config(&model_path);
    }

    fn save_config(&mut self, model_path: &str) {
        let config = AppConfig {
            model_path: model_path.to_string(),
            selected_classes: self.selected_classes.clone(),
            density_classes: self.density_classes.clone(),
        };
        if let Err(e) = config.save(&self.config_path) {
            tracing::error!("❌ {}", e);
            self.set_status(format!("保存config.txt失败: {}", e));
        }
    }

    /// 检测参数变化后同步到模型与叠加层
    pub fn apply_params(&mut self) {
        let (conf, iou) = (self.params.conf_threshold, self.params.iou_threshold);
        if let Some(det) = self.detector.as_mut() {
            det.model_mut().set_conf(conf);
            det.model_mut().set_iou(iou);
        }
        self.sync_detector();
    }

    pub fn save_params(&mut self) {
        self.params.save(&self.params_path);
        self.set_status(format!("检测参数已保存到 {}", self.params_path.display()));
    }

    pub fn toggle_detection(&mut self) {
        if self.is_detecting {
            self.stop_detection();
            self.set_status("检测已停止");
        } else {
            self.is_detecting = true;
            self.set_status("检测中...");
        }
    }

    /// 停止检测, 保留当前状态栏消息
    fn stop_detection(&mut self) {
        self.is_detecting = false;
        if let Some(det) = self.detector.as_mut() {
            det.clear();
        }
        self.last_report = FrameReport::default();
    }

    /// 平滑 FPS: fps = 0.9·fps + 0.1·(1000/间隔毫秒)
    pub fn tick_fps(&mut self, now: Instant) {
        if let Some(last) = self.last_frame_time {
            let elapsed_ms = now.saturating_duration_since(last).as_millis();
            if elapsed_ms > 0 {
                let current = 1000.0 / elapsed_ms as f32;
                self.fps = self.fps * 0.9 + current * 0.1;
            }
        }
        self.last_frame_time = Some(now);
    }

    /// 切换输入源时调用
    pub fn on_source_selected(&mut self, source: &VideoSource) {
        if let VideoSource::File(_) = source {
            // 打开视频后停止检测
            self.stop_detection();
        }
        self.last_report = FrameReport::default();
    }

    /// 处理采集线程事件, 返回需要显示的帧
    pub fn handle_capture_event(&mut self, event: CaptureEvent) -> Option<RgbImage> {
        match event {
            CaptureEvent::Opened(name) => {
                self.set_status(format!("已打开视频: {}", file_name(&name)));
                None
            }
            CaptureEvent::Error(msg) => {
                self.set_status(AppError::Capture(msg).to_string());
                self.stop_detection();
                None
            }
            CaptureEvent::Frame(frame) => {
                let Some(image) = RgbImage::from_raw(frame.width, frame.height, frame.rgb) else {
                    tracing::warn!("⚠️ 帧尺寸与数据长度不符: {}x{}", frame.width, frame.height);
                    return None;
                };
                Some(self.process(image))
            }
        }
    }

    /// 处理一帧: 检测中时推理、计数、记录密度样本并追加会话日志
    pub fn process(&mut self, mut frame: RgbImage) -> RgbImage {
        if !self.is_detecting {
            self.last_report = FrameReport::default();
            return frame;
        }
        let Some(det) = self.detector.as_mut() else {
            self.set_status("请先在设置中加载模型");
            self.stop_detection();
            return frame;
        };

        match det.process_frame(&mut frame) {
            Ok(report) => {
                let now = chrono::Local::now().format("%H:%M:%S").to_string();
                self.recognition
                    .record(now, &det.current_detection_info, &det.density_classes);
                if let Some(log) = &self.session_log {
                    if let Err(e) = log.append(&det.current_detection_info) {
                        tracing::warn!("⚠️  写入检测记录失败: {}", e);
                    }
                }
                self.last_report = report;
            }
            Err(e) => {
                tracing::error!("❌ {}", e);
                self.status = e.to_string();
            }
        }
        frame
    }

    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn count_label(&self) -> String {
        format!("识别到的鸟类数量: {}", self.last_report.total)
    }

    pub fn fps_label(&self) -> String {
        format!("FPS: {:.1}", self.fps)
    }

    pub fn detector(&self) -> Option<&ObjectDetector> {
        self.detector.as_ref()
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// 导出当前帧检测信息
    pub fn save_snapshot_csv(&mut self, path: impl AsRef<Path>) -> AppResult<usize> {
        let path = path.as_ref();
        let infos = self
            .detector
            .as_ref()
            .map(|d| d.current_detection_info.as_slice())
            .unwrap_or_default();
        match export::export_snapshot(path, infos) {
            Ok(n) => {
                self.set_status(format!("数据已保存到 {}", path.display()));
                Ok(n)
            }
            Err(AppError::NoDetectionData) => {
                self.set_status(AppError::NoDetectionData.to_string());
                Err(AppError::NoDetectionData)
            }
            Err(e) => {
                self.set_status(format!("保存文件失败: {}", e));
                Err(e)
            }
        }
    }

    /// 快照导出的默认文件名
    pub fn default_snapshot_path(&self) -> PathBuf {
        self.results_dir
            .join(format!("detection_snapshot_{}.csv", crate::gen_time_string("_")))
    }

    /// 退出: 生成趋势图, 失败只记录日志
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        self.is_detecting = false;
        self.detector = None;
        match export::plot_trends(&self.results_dir, &self.selected_classes, self.font.as_deref()) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("❌ 生成趋势图时出错: {}", e);
                None
            }
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detector::tests::{det, FakeModel};
    use crate::input::DecodedFrame;
    use anyhow::anyhow;
    use std::fs;
    use std::time::Duration;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn loader() -> ModelLoader {
        Box::new(|path: &str, _params: &DetectorParams| {
            if path.contains("missing") {
                return Err(anyhow!("模型文件不存在: {}", path));
            }
            let model = FakeModel::new(
                &["bird", "cat", "dog"],
                vec![det("bird", 0, 10.0), det("bird", 0, 60.0), det("cat", 1, 110.0)],
            );
            Ok(Box::new(model) as Box<dyn Model>)
        })
    }

    fn state(dir: &Path) -> AppState {
        AppState::new(
            dir.join("config.txt"),
            dir.join("detector_params.json"),
            dir.join("results"),
            DetectorParams::default(),
            loader(),
        )
    }

    fn frame() -> RgbImage {
        RgbImage::new(160, 80)
    }

    #[test]
    fn model_load_defaults_sets_to_all_classes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.load_model_and_classes("models/best.onnx");
        assert!(app.has_model());
        assert_eq!(app.all_classes, vec!["bird", "cat", "dog"]);
        assert_eq!(app.selected_classes, set(&["bird", "cat", "dog"]));
        assert_eq!(app.density_classes, set(&["bird", "cat", "dog"]));
        assert_eq!(app.status, "成功加载模型: best.onnx");
    }

    #[test]
    fn model_load_failure_clears_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.load_model_and_classes("a.onnx");
        app.load_model_and_classes("missing.onnx");
        assert!(!app.has_model());
        assert!(app.model_path.is_none());
        assert!(app.all_classes.is_empty());
        assert!(app.selected_classes.is_empty());
        assert!(app.density_classes.is_empty());
        assert!(app.status.starts_with("加载模型失败"));
    }

    #[test]
    fn preview_classes_without_replacing_model() {
        let dir = tempfile::tempdir().unwrap();
        let app = state(dir.path());
        assert_eq!(app.model_classes("x.onnx").unwrap(), vec!["bird", "cat", "dog"]);
        assert!(!app.has_model());
        assert!(matches!(
            app.model_classes("missing.onnx"),
            Err(AppError::ModelLoad(_))
        ));
    }

    #[test]
    fn missing_config_sets_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path()).with_default_model(dir.path().join("yolo11m.onnx"));
        app.apply_config(Ok(None), None);
        assert_eq!(app.status, "未找到config.txt文件，请进行设置");
        assert!(!app.has_model());
    }

    #[test]
    fn missing_config_loads_default_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("yolo11m.onnx");
        fs::write(&model, b"").unwrap();
        let mut app = state(dir.path()).with_default_model(&model);
        app.apply_config(Ok(None), None);
        assert!(app.has_model());
        assert_eq!(app.selected_classes, set(&["bird", "cat", "dog"]));
        assert_eq!(app.status, "未找到config.txt文件，请进行设置");
    }

    #[test]
    fn missing_config_prefers_command_line_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path()).with_default_model(dir.path().join("yolo11m.onnx"));
        app.apply_config(Ok(None), Some("cli.onnx".into()));
        assert!(app.has_model());
        assert_eq!(app.model_path.as_deref(), Some("cli.onnx"));
    }

    #[test]
    fn unreadable_config_falls_back_to_default_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("yolo11m.onnx");
        fs::write(&model, b"").unwrap();
        let mut app = state(dir.path()).with_default_model(&model);
        let err = AppError::Config {
            path: dir.path().join("config.txt"),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "stream did not contain valid UTF-8",
            ),
        };
        app.apply_config(Err(err), None);
        assert!(app.status.starts_with("读取config.txt失败"));
        assert!(app.has_model());
        assert_eq!(app.all_classes, vec!["bird", "cat", "dog"]);
    }

    #[test]
    fn config_classes_override_model_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("m.onnx");
        fs::write(&model, b"").unwrap();
        let config = AppConfig {
            model_path: model.to_string_lossy().to_string(),
            selected_classes: set(&["bird", "cat"]),
            density_classes: set(&["bird"]),
        };
        let mut app = state(dir.path());
        app.apply_config(Ok(Some(config)), None);
        assert!(app.has_model());
        assert_eq!(app.status, "已加载模型: m.onnx");
        assert_eq!(app.selected_classes, set(&["bird", "cat"]));
        assert_eq!(app.density_classes, set(&["bird"]));
        let det = app.detector().unwrap();
        assert_eq!(det.selected_classes, set(&["bird", "cat"]));
        assert_eq!(det.density_classes, set(&["bird"]));
    }

    #[test]
    fn config_with_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        let config = AppConfig {
            model_path: dir.path().join("nope.onnx").to_string_lossy().to_string(),
            ..AppConfig::default()
        };
        app.apply_config(Ok(Some(config)), None);
        assert_eq!(app.status, "配置中指定的模型文件不存在");
        assert!(!app.has_model());
    }

    #[test]
    fn detection_counts_records_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.start_session();
        app.load_model_and_classes("m.onnx");
        app.apply_density(set(&["bird"]));

        // 未开始检测时只显示画面
        app.process(frame());
        assert_eq!(app.count_label(), "识别到的鸟类数量: 0");
        assert!(app.recognition.is_empty());

        app.toggle_detection();
        assert_eq!(app.status, "检测中...");
        app.process(frame());
        assert_eq!(app.count_label(), "识别到的鸟类数量: 3");
        assert_eq!(app.recognition.len(), 1);
        assert_eq!(app.recognition.samples()[0].total, 2);

        let log = app.session_log().unwrap().path().to_path_buf();
        let records = export::csv::read_records(&log).unwrap();
        assert_eq!(records.len(), 3);

        app.toggle_detection();
        assert_eq!(app.status, "检测已停止");
        assert_eq!(app.count_label(), "识别到的鸟类数量: 0");
        assert!(app.detector().unwrap().current_detection_info.is_empty());
    }

    #[test]
    fn snapshot_without_detections_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        let path = dir.path().join("snap.csv");
        assert!(matches!(
            app.save_snapshot_csv(&path),
            Err(AppError::NoDetectionData)
        ));
        assert_eq!(app.status, "没有检测数据可保存");
        assert!(!path.exists());
    }

    #[test]
    fn snapshot_after_detection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.load_model_and_classes("m.onnx");
        app.toggle_detection();
        app.process(frame());
        let path = dir.path().join("snap.csv");
        assert_eq!(app.save_snapshot_csv(&path).unwrap(), 3);
        assert!(app.status.starts_with("数据已保存到"));
    }

    #[test]
    fn settings_save_config_and_default_density() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.apply_settings("m.onnx", set(&["cat"]));
        assert_eq!(app.selected_classes, set(&["cat"]));
        // 加载模型时密度类别已默认为全部类别
        assert_eq!(app.density_classes, set(&["bird", "cat", "dog"]));

        let saved = AppConfig::load(dir.path().join("config.txt"))
            .unwrap()
            .unwrap();
        assert_eq!(saved.model_path, "m.onnx");
        assert_eq!(saved.selected_classes, set(&["cat"]));
    }

    #[test]
    fn settings_keep_chosen_model_when_load_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.apply_settings("missing.onnx", set(&["bird"]));
        assert!(!app.has_model());

        let text = fs::read_to_string(dir.path().join("config.txt")).unwrap();
        assert!(text.starts_with("model=missing.onnx\n"));

        // 密度对话框随后保存时仍写入同一模型路径
        app.apply_density(set(&["bird"]));
        let saved = AppConfig::load(dir.path().join("config.txt"))
            .unwrap()
            .unwrap();
        assert_eq!(saved.model_path, "missing.onnx");
    }

    #[test]
    fn fps_is_smoothed() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        let t0 = Instant::now();
        app.tick_fps(t0);
        assert_eq!(app.fps, 0.0);
        app.tick_fps(t0 + Duration::from_millis(100));
        assert!((app.fps - 1.0).abs() < 1e-4);
        app.tick_fps(t0 + Duration::from_millis(200));
        assert!((app.fps - 1.9).abs() < 1e-4);
        assert_eq!(app.fps_label(), "FPS: 1.9");
    }

    #[test]
    fn capture_events_update_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.load_model_and_classes("m.onnx");
        app.toggle_detection();

        let shown = app.handle_capture_event(CaptureEvent::Frame(DecodedFrame {
            rgb: vec![0; 160 * 80 * 3],
            width: 160,
            height: 80,
        }));
        assert!(shown.is_some());
        assert_eq!(app.last_report().total, 3);

        let bad = app.handle_capture_event(CaptureEvent::Frame(DecodedFrame {
            rgb: vec![0; 5],
            width: 160,
            height: 80,
        }));
        assert!(bad.is_none());

        app.handle_capture_event(CaptureEvent::Error("摄像头无法打开或不可用".into()));
        assert!(!app.is_detecting);
        assert_eq!(app.status, "视频源错误: 摄像头无法打开或不可用");
    }

    #[test]
    fn opening_a_file_stops_detection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.toggle_detection();
        app.on_source_selected(&VideoSource::File(PathBuf::from("a.mp4")));
        assert!(!app.is_detecting);
    }

    #[test]
    fn shutdown_writes_trend_chart() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.start_session();
        app.load_model_and_classes("m.onnx");
        app.toggle_detection();
        app.process(frame());
        let png = app.shutdown().unwrap();
        assert!(png.exists());
    }
}
