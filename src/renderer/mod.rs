// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
mod chart;
mod control_panel;

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use image::RgbImage;
use macroquad::prelude::*;

use crate::app::AppState;
use crate::input::{CaptureEvent, CaptureWorker, VideoSource, FRAME_CHANNEL_CAPACITY};
pub use control_panel::{install_fonts, ControlPanel};
use control_panel::{INFO_HEIGHT, RIGHT_PANEL_WIDTH, STATUS_BAR_HEIGHT, TOP_BAR_HEIGHT};

pub const WINDOW_WIDTH: i32 = 1440;
pub const WINDOW_HEIGHT: i32 = 900;

pub struct Renderer {
    pub app: AppState,

    tx: Sender<CaptureEvent>,
    rx: Receiver<CaptureEvent>,
    worker: Option<CaptureWorker>,

    last_frame: Option<Texture2D>,
    video_rect: Rect,

    // 中文字体
    chinese_font: Option<Font>,

    is_fullscreen: bool,
    exit_requested: bool,

    control_panel: ControlPanel,
}

impl Renderer {
    pub fn new(app: AppState, font_bytes: Option<&[u8]>) -> Self {
        tracing::info!("🎨 渲染器启动");
        let (tx, rx) = crossbeam_channel::bounded(FRAME_CHANNEL_CAPACITY);

        let chinese_font = font_bytes.and_then(|bytes| match load_ttf_font_from_bytes(bytes) {
            Ok(font) => {
                tracing::info!("✅ 中文字体加载成功");
                Some(font)
            }
            Err(e) => {
                tracing::warn!("⚠️ 中文字体加载失败: {}", e);
                None
            }
        });
        if let Some(bytes) = font_bytes {
            let bytes = bytes.to_vec();
            egui_macroquad::cfg(|egui_ctx| install_fonts(egui_ctx, bytes));
        }

        Self {
            app,
            tx,
            rx,
            worker: None,
            last_frame: None,
            video_rect: default_video_rect(),
            chinese_font,
            is_fullscreen: false,
            exit_requested: false,
            control_panel: ControlPanel::new(),
        }
    }

    /// 切换输入源, 旧采集线程随代数失效自行退出
    pub fn start_source(&mut self, source: VideoSource) {
        if let Some(mut old) = self.worker.take() {
            old.stop();
        }
        // 丢弃旧输入源残留的事件
        while self.rx.try_recv().is_ok() {}

        self.app.on_source_selected(&source);
        match CaptureWorker::spawn(source.clone(), self.tx.clone(), self.rx.clone()) {
            Ok(worker) => {
                self.app.status = format!("正在打开: {}", source);
                self.worker = Some(worker);
            }
            Err(e) => {
                tracing::error!("❌ 无法启动采集线程: {}", e);
                self.app.status = format!("无法打开视频源: {}", e);
            }
        }
        self.last_frame = None;
    }

    pub fn update(&mut self) {
        // 只处理最新一帧, 其余事件照常处理
        let mut latest = None;
        for event in self.rx.try_iter() {
            match event {
                CaptureEvent::Frame(frame) => latest = Some(frame),
                other => {
                    let is_error = matches!(other, CaptureEvent::Error(_));
                    self.app.handle_capture_event(other);
                    if is_error {
                        self.last_frame = None;
                    }
                }
            }
        }

        if let Some(frame) = latest {
            self.app.tick_fps(Instant::now());
            if let Some(image) = self.app.handle_capture_event(CaptureEvent::Frame(frame)) {
                self.upload(&image);
            }
        }
    }

    /// RGB → RGBA, 只在分辨率变化时重建纹理
    fn upload(&mut self, image: &RgbImage) {
        let (w, h) = image.dimensions();
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for px in image.pixels() {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }

        let needs_rebuild = match &self.last_frame {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, &rgba);
            texture.set_filter(FilterMode::Linear);
            self.last_frame = Some(texture);
        } else if let Some(tex) = &self.last_frame {
            tex.update(&Image {
                bytes: rgba,
                width: w as u16,
                height: h as u16,
            });
        }
    }

    pub fn draw(&mut self) {
        clear_background(Color::from_rgba(20, 20, 26, 255));
        let area = self.video_rect;
        draw_rectangle(area.x, area.y, area.w, area.h, BLACK);

        // 绘制视频帧, 保持宽高比居中
        if let Some(texture) = &self.last_frame {
            let scale = (area.w / texture.width()).min(area.h / texture.height());
            let (w, h) = (texture.width() * scale, texture.height() * scale);
            draw_texture_ex(
                texture,
                area.x + (area.w - w) / 2.0,
                area.y + (area.h - h) / 2.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(w, h)),
                    ..Default::default()
                },
            );
            return;
        }

        // 没有视频时显示提示文字
        let text = "未打开摄像头或视频";
        let hint = "请通过上方工具栏选择摄像头或打开视频文件";
        let font = self.chinese_font.as_ref();
        let dims = measure_text(text, font, 40, 1.0);
        draw_text_ex(
            text,
            area.x + (area.w - dims.width) / 2.0,
            area.y + area.h / 2.0,
            TextParams {
                font,
                font_size: 40,
                color: WHITE,
                ..Default::default()
            },
        );
        let hint_dims = measure_text(hint, font, 22, 1.0);
        draw_text_ex(
            hint,
            area.x + (area.w - hint_dims.width) / 2.0,
            area.y + area.h / 2.0 + 44.0,
            TextParams {
                font,
                font_size: 22,
                color: GRAY,
                ..Default::default()
            },
        );
    }

    pub fn draw_egui(&mut self) {
        let mut actions = None;
        egui_macroquad::ui(|egui_ctx| {
            actions = Some(
                self.control_panel
                    .show(egui_ctx, &mut self.app, self.is_fullscreen),
            );
        });
        egui_macroquad::draw();

        let Some(actions) = actions else {
            return;
        };
        if let Some(area) = actions.video_area {
            self.video_rect = Rect::new(area.min.x, area.min.y, area.width(), area.height());
        }
        if let Some((model, selected)) = actions.settings {
            self.app.apply_settings(&model, selected);
        }
        if let Some(density) = actions.density {
            self.app.apply_density(density);
        }
        if actions.params_changed {
            self.app.apply_params();
        }
        if actions.save_params {
            self.app.save_params();
        }
        if let Some(path) = actions.save_csv {
            // 状态栏已提示结果
            let _ = self.app.save_snapshot_csv(&path);
        }
        if actions.toggle_detection {
            self.app.toggle_detection();
        }
        if actions.toggle_fullscreen {
            self.apply_fullscreen(!self.is_fullscreen);
        }
        if let Some(source) = actions.start_source {
            self.start_source(source);
        }
        if actions.exit_confirmed {
            self.exit_requested = true;
        }
    }

    fn apply_fullscreen(&mut self, on: bool) {
        self.is_fullscreen = on;
        set_fullscreen(on);
        if !on {
            request_new_screen_size(WINDOW_WIDTH as f32, WINDOW_HEIGHT as f32);
        }
    }

    pub fn handle_input(&mut self) {
        if is_key_pressed(KeyCode::F11) {
            self.apply_fullscreen(!self.is_fullscreen);
        }
        if is_key_pressed(KeyCode::Escape) && self.is_fullscreen {
            self.apply_fullscreen(false);
        }
        if is_key_pressed(KeyCode::Space) && !self.wants_keyboard() {
            self.app.toggle_detection();
        }
        if is_quit_requested() {
            self.control_panel.show_exit_confirm = true;
        }
    }

    fn wants_keyboard(&self) -> bool {
        let mut wants = false;
        egui_macroquad::cfg(|ctx| wants = ctx.wants_keyboard_input());
        wants
    }

    pub fn should_exit(&self) -> bool {
        self.exit_requested
    }

    /// 停止采集并生成趋势图
    pub fn shutdown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        if let Some(path) = self.app.shutdown() {
            tracing::info!("📈 趋势图: {}", path.display());
        }
    }
}

/// 首帧布局前的视频区域
fn default_video_rect() -> Rect {
    Rect::new(
        0.0,
        TOP_BAR_HEIGHT,
        WINDOW_WIDTH as f32 - RIGHT_PANEL_WIDTH,
        WINDOW_HEIGHT as f32 - TOP_BAR_HEIGHT - STATUS_BAR_HEIGHT - INFO_HEIGHT,
    )
}
