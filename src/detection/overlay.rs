// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 画面叠加层: 检测框、类别名、计数条、阈值条、统计面板
//!
//! 所有坐标均为原始帧像素坐标, 字体缺失时只画图形不画文字。

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::types::{CountStats, CrowdStatus};
use crate::models::Detection;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME_COLOR: Rgb<u8> = Rgb([180, 180, 180]);
const TRACK_COLOR: Rgb<u8> = Rgb([50, 50, 50]);
const PANEL_COLOR: Rgb<u8> = Rgb([44, 44, 44]);

const LABEL_SCALE: f32 = 24.0;
const SUMMARY_SCALE: f32 = 30.0;
const BAR_SCALE: f32 = 20.0;

const BAR_HEIGHT: u32 = 25;
const BAR_PADDING: i32 = 20;

/// 加载 TTF/OTF 字体
pub fn load_font(bytes: Vec<u8>) -> Option<FontVec> {
    // ttc 字体集合取第一个字体
    match FontVec::try_from_vec_and_index(bytes, 0) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!("⚠️  字体解析失败, 画面标注将不显示文字: {}", e);
            None
        }
    }
}

/// 宽高为 0 的矩形 imageproc 不接受
fn rect(x: i32, y: i32, w: u32, h: u32) -> Option<Rect> {
    (w > 0 && h > 0).then(|| Rect::at(x, y).of_size(w, h))
}

fn fill(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    if let Some(r) = rect(x, y, w, h) {
        draw_filled_rect_mut(img, r, color);
    }
}

fn outline(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    if let Some(r) = rect(x, y, w, h) {
        draw_hollow_rect_mut(img, r, color);
    }
}

fn text(img: &mut RgbImage, font: Option<&FontVec>, x: i32, y: i32, scale: f32, color: Rgb<u8>, s: &str) {
    if let Some(font) = font {
        draw_text_mut(img, color, x, y, PxScale::from(scale), font, s);
    }
}

fn text_height(font: Option<&FontVec>, scale: f32, s: &str) -> i32 {
    font.map(|f| text_size(PxScale::from(scale), f, s).1 as i32)
        .unwrap_or(scale as i32)
}

fn text_width(font: Option<&FontVec>, scale: f32, s: &str) -> i32 {
    font.map(|f| text_size(PxScale::from(scale), f, s).0 as i32)
        .unwrap_or(0)
}

/// 绿色 2px 检测框, 类别名写在框上方
pub fn draw_detection(img: &mut RgbImage, font: Option<&FontVec>, det: &Detection) {
    let x1 = det.bbox.xmin().round() as i32;
    let y1 = det.bbox.ymin().round() as i32;
    let w = det.bbox.width().round() as u32;
    let h = det.bbox.height().round() as u32;

    outline(img, x1, y1, w, h, BOX_COLOR);
    outline(img, x1 + 1, y1 + 1, w.saturating_sub(2), h.saturating_sub(2), BOX_COLOR);

    let th = text_height(font, LABEL_SCALE, &det.class_name);
    let ty = (y1 - 10 - th).max(0);
    text(img, font, x1, ty, LABEL_SCALE, BOX_COLOR, &det.class_name);
}

/// 左上角 `cls=n cls=n` 摘要, 基线位于 (10, 30)
pub fn draw_summary(img: &mut RgbImage, font: Option<&FontVec>, label: &str) {
    let th = text_height(font, SUMMARY_SCALE, label);
    text(img, font, 10, (30 - th).max(0), SUMMARY_SCALE, BOX_COLOR, label);
}

fn draw_bar(img: &mut RgbImage, bar_x: i32, bar_width: u32, fraction: f32, color: [u8; 3]) {
    let bar_y = BAR_PADDING;
    let filled = ((fraction * bar_width as f32) as u32).min(bar_width);

    fill(img, bar_x - 5, bar_y - 5, bar_width + 10, BAR_HEIGHT + 10, FRAME_COLOR);
    fill(img, bar_x, bar_y, bar_width, BAR_HEIGHT, TRACK_COLOR);
    fill(img, bar_x, bar_y, filled, BAR_HEIGHT, Rgb(color));
    outline(img, bar_x, bar_y, bar_width, BAR_HEIGHT, FRAME_COLOR);
}

/// 左上角计数条 `COUNT: n`
pub fn draw_counting_bar(img: &mut RgbImage, font: Option<&FontVec>, count: usize, threshold: u32) {
    let bar_width = 200;
    let status = CrowdStatus::from_count(count, threshold);
    let fraction = count as f32 / threshold.max(1) as f32;
    draw_bar(img, BAR_PADDING, bar_width, fraction, status.color());

    let label = format!("COUNT: {}", count);
    let th = text_height(font, BAR_SCALE, &label);
    let ty = BAR_PADDING + (BAR_HEIGHT as i32 - th) / 2;
    text(img, font, BAR_PADDING + 10, ty, BAR_SCALE, TEXT_COLOR, &label);
}

/// 阈值百分比, 上限 100
pub fn threshold_percentage(count: usize, threshold: u32) -> u32 {
    let fraction = (count as f32 / threshold.max(1) as f32).min(1.0);
    ((fraction * 100.0) as u32).min(100)
}

/// 右上角阈值条 `THRESHOLD: p%`
pub fn draw_threshold_bar(img: &mut RgbImage, font: Option<&FontVec>, count: usize, threshold: u32) {
    let bar_width = 250;
    let bar_x = img.width() as i32 - bar_width as i32 - BAR_PADDING;
    let status = CrowdStatus::from_count(count, threshold);
    let fraction = (count as f32 / threshold.max(1) as f32).min(1.0);
    draw_bar(img, bar_x, bar_width, fraction, status.color());

    let label = format!("THRESHOLD: {}%", threshold_percentage(count, threshold));
    let tw = text_width(font, BAR_SCALE, &label);
    let th = text_height(font, BAR_SCALE, &label);
    let tx = bar_x + bar_width as i32 - tw - 10;
    let ty = BAR_PADDING + (BAR_HEIGHT as i32 - th) / 2;
    text(img, font, tx, ty, BAR_SCALE, TEXT_COLOR, &label);
}

/// 统计面板文字, 最后一行是当前数量对应的拥挤状态
pub fn statistics_lines(stats: &CountStats, threshold: u32) -> [String; 4] {
    let status = CrowdStatus::from_count(stats.current(), threshold);
    [
        format!("当前数量: {}", stats.current()),
        format!("最大数量: {}", stats.max()),
        format!("平均数量: {:.1}", stats.average()),
        format!("状态: {}", status.label()),
    ]
}

/// 左下角统计面板
pub fn draw_statistics_panel(
    img: &mut RgbImage,
    font: Option<&FontVec>,
    stats: &CountStats,
    threshold: u32,
) {
    let (panel_w, panel_h) = (250u32, 150u32);
    let panel_x = 20;
    let panel_y = img.height() as i32 - panel_h as i32 - 40;

    fill(img, panel_x, panel_y, panel_w, panel_h, PANEL_COLOR);
    outline(img, panel_x, panel_y, panel_w, panel_h, FRAME_COLOR);

    for (i, line) in statistics_lines(stats, threshold).iter().enumerate() {
        let ty = panel_y + 15 + i as i32 * 30;
        text(img, font, panel_x + 10, ty, BAR_SCALE, TEXT_COLOR, line);
    }
}
