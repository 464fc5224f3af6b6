// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 鸟类检测系统主程序
///
/// 直接运行: cargo run --bin bird-detector --release
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bird_detector::app::{AppState, ModelLoader};
use bird_detector::detection::overlay::load_font;
use bird_detector::input::{get_video_devices, VideoSource};
use bird_detector::renderer::{Renderer, WINDOW_HEIGHT, WINDOW_WIDTH};
use bird_detector::{AppConfig, Args, DetectorParams, Model, YOLOv8};
use clap::Parser;
use macroquad::prelude::*;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 未指定 --font 时依次尝试的中文字体
const FONT_CANDIDATES: [&str; 5] = [
    "assets/font/msyh.ttc",
    "C:/Windows/Fonts/msyh.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
];

fn window_conf() -> Conf {
    Conf {
        window_title: "鸟类检测系统".to_owned(),
        window_width: WINDOW_WIDTH,
        window_height: WINDOW_HEIGHT,
        window_resizable: true,
        high_dpi: false,
        ..Default::default()
    }
}

fn read_font(explicit: Option<&Path>) -> Option<Vec<u8>> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
    };
    for path in candidates {
        if let Ok(bytes) = std::fs::read(&path) {
            tracing::info!("🔤 使用字体: {}", path.display());
            return Some(bytes);
        }
    }
    tracing::warn!("⚠️ 未找到中文字体文件, 界面中文可能无法显示");
    None
}

fn yolo_loader() -> ModelLoader {
    Box::new(|path: &str, params: &DetectorParams| {
        let model = YOLOv8::new(path, params)?;
        Ok(Box::new(model) as Box<dyn Model>)
    })
}

fn initial_source(args: &Args) -> Option<VideoSource> {
    if let Some(path) = &args.video {
        return Some(VideoSource::File(path.clone()));
    }
    let index = args.camera?;
    let name = get_video_devices()
        .into_iter()
        .find(|d| d.index == index)
        .map(|d| d.name)
        .unwrap_or_default();
    Some(VideoSource::Camera { index, name })
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("🐦 鸟类检测系统启动 | 窗口 {}x{}", WINDOW_WIDTH, WINDOW_HEIGHT);

    let params = DetectorParams::load(&args.params);
    params.print_summary();

    let font_bytes = read_font(args.font.as_deref());
    let overlay_font = font_bytes.clone().and_then(load_font).map(Arc::new);

    let mut app = AppState::new(
        args.config.clone(),
        args.params.clone(),
        args.results_dir.clone(),
        params,
        yolo_loader(),
    )
    .with_font(overlay_font);
    app.start_session();
    app.apply_config(AppConfig::load(&args.config), args.model.clone());

    let mut renderer = Renderer::new(app, font_bytes.as_deref());
    if let Some(source) = initial_source(&args) {
        renderer.start_source(source);
    }

    // 关闭窗口需要确认
    prevent_quit();

    loop {
        renderer.handle_input();
        renderer.update();
        renderer.draw();
        renderer.draw_egui();

        if renderer.should_exit() {
            break;
        }
        next_frame().await;
    }

    tracing::info!("👋 正在退出...");
    renderer.shutdown();
}
