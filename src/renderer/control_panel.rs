// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use egui_macroquad::egui::{self, Color32, RichText};

use super::chart;
use crate::app::AppState;
use crate::input::{get_video_devices, VideoDevice, VideoSource};

pub const TOP_BAR_HEIGHT: f32 = 40.0;
pub const STATUS_BAR_HEIGHT: f32 = 28.0;
pub const RIGHT_PANEL_WIDTH: f32 = 460.0;
pub const INFO_HEIGHT: f32 = 64.0;
const CHART_HEIGHT: f32 = 420.0;

/// 给 egui 注册中文字体, 放在默认字体之前
pub fn install_fonts(ctx: &egui::Context, bytes: Vec<u8>) {
    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("chinese".to_owned(), Arc::new(egui::FontData::from_owned(bytes)));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .insert(0, "chinese".to_owned());
    }
    ctx.set_fonts(fonts);
}

/// 控制面板状态 (各对话框的临时输入)
pub struct ControlPanel {
    style_applied: bool,

    // 设置对话框
    pub show_settings: bool,
    settings_model_path: String,
    settings_classes: Vec<String>,
    settings_selected: BTreeSet<String>,
    settings_error: Option<String>,

    // 密度图设置
    pub show_density: bool,
    density_selected: BTreeSet<String>,

    // 摄像头选择
    pub show_camera: bool,
    pub video_devices: Vec<VideoDevice>,
    pub selected_device_index: usize,

    // 打开视频
    pub show_open_video: bool,
    video_path: String,
    video_error: Option<String>,

    // 保存 CSV
    pub show_save_csv: bool,
    csv_path: String,

    pub show_about: bool,
    pub show_exit_confirm: bool,
}

/// 控制面板操作返回值
#[derive(Default)]
pub struct ControlPanelActions {
    pub start_source: Option<VideoSource>,
    pub toggle_detection: bool,
    pub toggle_fullscreen: bool,
    pub save_csv: Option<PathBuf>,
    pub settings: Option<(String, BTreeSet<String>)>,
    pub density: Option<BTreeSet<String>>,
    pub params_changed: bool,
    pub save_params: bool,
    pub exit_confirmed: bool,
    /// 视频区域 (egui 坐标)
    pub video_area: Option<egui::Rect>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            style_applied: false,
            show_settings: false,
            settings_model_path: String::new(),
            settings_classes: Vec::new(),
            settings_selected: BTreeSet::new(),
            settings_error: None,
            show_density: false,
            density_selected: BTreeSet::new(),
            show_camera: false,
            video_devices: Vec::new(),
            selected_device_index: 0,
            show_open_video: false,
            video_path: String::new(),
            video_error: None,
            show_save_csv: false,
            csv_path: String::new(),
            show_about: false,
            show_exit_confirm: false,
        }
    }

    fn set_style(&mut self, ctx: &egui::Context) {
        if self.style_applied {
            return;
        }
        // --- 深色主题 ---
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = Color32::from_rgb(32, 34, 40);
        visuals.panel_fill = Color32::from_rgb(26, 28, 33);
        visuals.window_stroke = egui::Stroke::new(1.0, Color32::from_rgb(70, 75, 85));

        visuals.widgets.inactive.weak_bg_fill = Color32::from_rgb(45, 48, 56);
        visuals.widgets.inactive.corner_radius = 3.0.into();
        visuals.widgets.hovered.weak_bg_fill = Color32::from_rgb(60, 64, 74);
        visuals.widgets.hovered.corner_radius = 3.0.into();
        visuals.widgets.active.weak_bg_fill = Color32::from_rgb(70, 110, 170);
        visuals.widgets.active.corner_radius = 3.0.into();

        visuals.selection.bg_fill = Color32::from_rgb(60, 110, 200);
        visuals.override_text_color = Some(Color32::from_rgb(230, 240, 250));

        ctx.set_visuals(visuals);
        self.style_applied = true;
    }

    /// 打开设置对话框, 从当前状态复制初始值
    pub fn open_settings(&mut self, app: &AppState) {
        self.settings_model_path = app.model_path.clone().unwrap_or_default();
        self.settings_classes = app.all_classes.clone();
        self.settings_selected = app.selected_classes.clone();
        self.settings_error = None;
        self.show_settings = true;
    }

    pub fn open_density(&mut self, app: &AppState) {
        self.density_selected = app
            .density_classes
            .intersection(&app.selected_classes)
            .cloned()
            .collect();
        self.show_density = true;
    }

    pub fn open_camera(&mut self) {
        self.video_devices = get_video_devices();
        self.selected_device_index = 0;
        self.show_camera = true;
    }

    pub fn open_save_csv(&mut self, app: &AppState) {
        self.csv_path = app.default_snapshot_path().display().to_string();
        self.show_save_csv = true;
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        app: &mut AppState,
        is_fullscreen: bool,
    ) -> ControlPanelActions {
        self.set_style(ctx);
        let mut actions = ControlPanelActions::default();

        self.top_bar(ctx, app, is_fullscreen, &mut actions);

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(STATUS_BAR_HEIGHT)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(&app.status);
                });
            });

        egui::SidePanel::right("right_panel")
            .exact_width(RIGHT_PANEL_WIDTH)
            .resizable(false)
            .show(ctx, |ui| self.right_panel(ui, app, &mut actions));

        // 左侧: 视频由 macroquad 绘制, 这里只放数量与 FPS
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let full = ui.max_rect();
                let video = egui::Rect::from_min_max(
                    full.min,
                    egui::pos2(full.max.x, full.max.y - INFO_HEIGHT),
                );
                actions.video_area = Some(video);

                ui.with_layout(egui::Layout::bottom_up(egui::Align::Min), |ui| {
                    ui.add_space(6.0);
                    ui.label(RichText::new(app.fps_label()).size(16.0));
                    ui.label(
                        RichText::new(app.count_label())
                            .size(22.0)
                            .strong()
                            .color(Color32::from_rgb(120, 220, 120)),
                    );
                });
            });

        self.settings_window(ctx, app, &mut actions);
        self.density_window(ctx, app, &mut actions);
        self.camera_window(ctx, &mut actions);
        self.open_video_window(ctx, &mut actions);
        self.save_csv_window(ctx, &mut actions);
        self.about_window(ctx);
        self.exit_window(ctx, &mut actions);

        actions
    }

    fn top_bar(
        &mut self,
        ctx: &egui::Context,
        app: &AppState,
        is_fullscreen: bool,
        actions: &mut ControlPanelActions,
    ) {
        egui::TopBottomPanel::top("top_bar")
            .exact_height(TOP_BAR_HEIGHT)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    if ui.button("⚙ 设置").clicked() {
                        self.open_settings(app);
                    }
                    if ui.button("💾 保存数据为 CSV").clicked() {
                        self.open_save_csv(app);
                    }
                    if ui.button("🎬 打开视频").clicked() {
                        self.video_error = None;
                        self.show_open_video = true;
                    }
                    if ui.button("📷 选择摄像头").clicked() {
                        self.open_camera();
                    }
                    let fullscreen_label = if is_fullscreen { "退出全屏" } else { "全屏" };
                    if ui.button(fullscreen_label).clicked() {
                        actions.toggle_fullscreen = true;
                    }
                    if ui.button("ℹ 关于").clicked() {
                        self.show_about = true;
                    }
                });
            });
    }

    fn right_panel(&mut self, ui: &mut egui::Ui, app: &AppState, actions: &mut ControlPanelActions) {
        ui.add_space(8.0);
        chart::show_density_chart(ui, &app.recognition, &app.density_classes, CHART_HEIGHT);
        ui.add_space(6.0);
        if ui.button("📈 密度图设置").clicked() {
            self.open_density(app);
        }

        ui.separator();

        // 当前帧各类别数量
        egui::CollapsingHeader::new("📊 当前帧统计")
            .default_open(true)
            .show(ui, |ui| {
                let report = app.last_report();
                if report.class_counts.is_empty() {
                    ui.label("暂无检测结果");
                }
                for (name, count) in &report.class_counts {
                    ui.label(format!("{}: {}", name, count));
                }
                if let Some(det) = app.detector() {
                    let stats = det.stats();
                    if !stats.is_empty() {
                        ui.label(format!(
                            "最大数量: {} | 平均数量: {:.1}",
                            stats.max(),
                            stats.average()
                        ));
                    }
                }
            });

        ui.with_layout(egui::Layout::bottom_up(egui::Align::Center), |ui| {
            ui.add_space(12.0);
            let (text, color) = if app.is_detecting {
                ("⏹ 停止检测", Color32::from_rgb(170, 60, 60))
            } else {
                ("▶ 开始检测", Color32::from_rgb(50, 130, 70))
            };
            let button = egui::Button::new(RichText::new(text).size(20.0))
                .fill(color)
                .min_size(egui::vec2(RIGHT_PANEL_WIDTH - 40.0, 48.0));
            if ui.add(button).clicked() {
                actions.toggle_detection = true;
            }
        });
    }

    fn settings_window(
        &mut self,
        ctx: &egui::Context,
        app: &mut AppState,
        actions: &mut ControlPanelActions,
    ) {
        if !self.show_settings {
            return;
        }
        let mut open = true;
        let mut close = false;
        egui::Window::new("设置")
            .open(&mut open)
            .collapsible(false)
            .default_size(egui::vec2(420.0, 520.0))
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("模型文件 (.onnx):");
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut self.settings_model_path)
                            .desired_width(300.0)
                            .hint_text("未选择模型"),
                    );
                    if ui.button("读取类别").clicked() {
                        match app.model_classes(self.settings_model_path.trim()) {
                            Ok(classes) => {
                                // 新模型默认全选
                                self.settings_selected = classes.iter().cloned().collect();
                                self.settings_classes = classes;
                                self.settings_error = None;
                            }
                            Err(e) => self.settings_error = Some(e.to_string()),
                        }
                    }
                });
                if let Some(err) = &self.settings_error {
                    ui.colored_label(Color32::from_rgb(230, 90, 90), err);
                }

                ui.separator();
                ui.label("请选择需要识别的类别：");
                class_checkboxes(
                    ui,
                    "settings_classes",
                    &self.settings_classes,
                    &mut self.settings_selected,
                );

                ui.separator();
                egui::CollapsingHeader::new("检测参数")
                    .default_open(false)
                    .show(ui, |ui| {
                        let params = &mut app.params;
                        let mut changed = false;
                        changed |= ui
                            .add(egui::Slider::new(&mut params.conf_threshold, 0.0..=1.0).text("置信度"))
                            .changed();
                        changed |= ui
                            .add(egui::Slider::new(&mut params.iou_threshold, 0.0..=1.0).text("IOU"))
                            .changed();
                        changed |= ui
                            .add(egui::Slider::new(&mut params.crowd_threshold, 1..=500).text("拥挤阈值"))
                            .changed();
                        changed |= ui
                            .checkbox(&mut params.show_overlay, "显示计数叠加层")
                            .changed();
                        actions.params_changed |= changed;
                        if ui.button("保存参数").clicked() {
                            actions.save_params = true;
                        }
                    });

                ui.separator();
                ui.horizontal(|ui| {
                    let path = self.settings_model_path.trim();
                    if ui
                        .add_enabled(!path.is_empty(), egui::Button::new("确认"))
                        .clicked()
                    {
                        actions.settings = Some((path.to_string(), self.settings_selected.clone()));
                        close = true;
                    }
                    if ui.button("取消").clicked() {
                        close = true;
                    }
                });
            });
        self.show_settings = open && !close;
    }

    fn density_window(
        &mut self,
        ctx: &egui::Context,
        app: &AppState,
        actions: &mut ControlPanelActions,
    ) {
        if !self.show_density {
            return;
        }
        let mut open = true;
        let mut close = false;
        let classes: Vec<String> = app.selected_classes.iter().cloned().collect();
        egui::Window::new("密度图设置")
            .open(&mut open)
            .collapsible(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("请选择需要显示的类别：");
                class_checkboxes(ui, "density_classes", &classes, &mut self.density_selected);
                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("确认").clicked() {
                        actions.density = Some(self.density_selected.clone());
                        close = true;
                    }
                    if ui.button("取消").clicked() {
                        close = true;
                    }
                });
            });
        self.show_density = open && !close;
    }

    fn camera_window(&mut self, ctx: &egui::Context, actions: &mut ControlPanelActions) {
        if !self.show_camera {
            return;
        }
        let mut open = true;
        let mut close = false;
        egui::Window::new("选择摄像头")
            .open(&mut open)
            .collapsible(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                if self.video_devices.is_empty() {
                    ui.colored_label(Color32::YELLOW, "未检测到可用的摄像头！");
                    if ui.button("🔄 重试").clicked() {
                        self.video_devices = get_video_devices();
                    }
                    return;
                }

                ui.label("请选择要使用的摄像头：");
                egui::ComboBox::from_id_salt("camera_select")
                    .width(280.0)
                    .selected_text(
                        self.video_devices
                            .get(self.selected_device_index)
                            .map(|d| format!("摄像头 {} ({})", d.index, d.name))
                            .unwrap_or_else(|| "未知".to_string()),
                    )
                    .show_ui(ui, |ui| {
                        for (idx, device) in self.video_devices.iter().enumerate() {
                            ui.selectable_value(
                                &mut self.selected_device_index,
                                idx,
                                format!("摄像头 {} ({})", device.index, device.name),
                            );
                        }
                    });

                ui.horizontal(|ui| {
                    if ui.button("确定").clicked() {
                        if let Some(device) = self.video_devices.get(self.selected_device_index) {
                            actions.start_source = Some(VideoSource::Camera {
                                index: device.index,
                                name: device.name.clone(),
                            });
                        }
                        close = true;
                    }
                    if ui.button("取消").clicked() {
                        close = true;
                    }
                });
            });
        self.show_camera = open && !close;
    }

    fn open_video_window(&mut self, ctx: &egui::Context, actions: &mut ControlPanelActions) {
        if !self.show_open_video {
            return;
        }
        let mut open = true;
        let mut close = false;
        egui::Window::new("打开视频")
            .open(&mut open)
            .collapsible(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("视频文件路径 (mp4 / avi / mov / mkv):");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.video_path)
                        .desired_width(360.0)
                        .hint_text("输入视频路径后按回车..."),
                );
                let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if let Some(err) = &self.video_error {
                    ui.colored_label(Color32::from_rgb(230, 90, 90), err);
                }
                ui.horizontal(|ui| {
                    if ui.button("打开").clicked() || enter {
                        let path = PathBuf::from(self.video_path.trim());
                        if path.is_file() {
                            actions.start_source = Some(VideoSource::File(path));
                            close = true;
                        } else {
                            self.video_error = Some("视频文件不存在".to_string());
                        }
                    }
                    if ui.button("取消").clicked() {
                        close = true;
                    }
                });
            });
        self.show_open_video = open && !close;
    }

    fn save_csv_window(&mut self, ctx: &egui::Context, actions: &mut ControlPanelActions) {
        if !self.show_save_csv {
            return;
        }
        let mut open = true;
        let mut close = false;
        egui::Window::new("保存数据")
            .open(&mut open)
            .collapsible(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("CSV 文件路径:");
                ui.add(egui::TextEdit::singleline(&mut self.csv_path).desired_width(360.0));
                ui.horizontal(|ui| {
                    let path = self.csv_path.trim();
                    if ui
                        .add_enabled(!path.is_empty(), egui::Button::new("保存"))
                        .clicked()
                    {
                        actions.save_csv = Some(PathBuf::from(path));
                        close = true;
                    }
                    if ui.button("取消").clicked() {
                        close = true;
                    }
                });
            });
        self.show_save_csv = open && !close;
    }

    fn about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("关于")
            .open(&mut self.show_about)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(RichText::new("YOLO智能识别分析系统").size(18.0).strong());
                ui.label(format!("版本: {}", env!("CARGO_PKG_VERSION")));
                ui.label("© 2025 版权所有:睿翼智控");
            });
    }

    fn exit_window(&mut self, ctx: &egui::Context, actions: &mut ControlPanelActions) {
        if !self.show_exit_confirm {
            return;
        }
        let mut close = false;
        egui::Window::new("确认退出")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("确定要退出程序吗？");
                ui.horizontal(|ui| {
                    if ui.button("是").clicked() {
                        actions.exit_confirmed = true;
                        close = true;
                    }
                    if ui.button("否").clicked() {
                        close = true;
                    }
                });
            });
        if close {
            self.show_exit_confirm = false;
        }
    }
}

/// 类别复选框列表 + 全选/全不选
fn class_checkboxes(
    ui: &mut egui::Ui,
    id: &str,
    classes: &[String],
    selected: &mut BTreeSet<String>,
) {
    if classes.is_empty() {
        ui.label("暂无类别, 请先加载模型");
        return;
    }
    ui.horizontal(|ui| {
        if ui.small_button("全选").clicked() {
            selected.extend(classes.iter().cloned());
        }
        if ui.small_button("全不选").clicked() {
            selected.clear();
        }
    });
    egui::ScrollArea::vertical()
        .id_salt(id)
        .max_height(280.0)
        .show(ui, |ui| {
            for class in classes {
                let mut checked = selected.contains(class);
                if ui.checkbox(&mut checked, class).changed() {
                    if checked {
                        selected.insert(class.clone());
                    } else {
                        selected.remove(class);
                    }
                }
            }
        });
}
