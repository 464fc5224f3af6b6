// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 退出时生成的检测数量趋势图 (PNG)

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use chrono::NaiveDateTime;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use super::csv::{read_records, CsvRecord, SESSION_PREFIX};
use crate::error::{AppError, AppResult};
use crate::gen_time_string;
use crate::recognition::palette_color;

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 800;
const MARGIN_LEFT: f32 = 90.0;
const MARGIN_RIGHT: f32 = 40.0;
const MARGIN_TOP: f32 = 70.0;
const MARGIN_BOTTOM: f32 = 110.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([210, 210, 210]);

/// 按类别分组后的时间序列
pub type TrendSeries = BTreeMap<String, Vec<(NaiveDateTime, u32)>>;

/// 结果目录中最新的会话记录文件
pub fn latest_session_csv(results_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let entries = fs::read_dir(results_dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(SESSION_PREFIX) && name.ends_with(".csv")
        })
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

/// 按类别分组, 只保留识别类别
pub fn group_by_class(records: Vec<CsvRecord>, selected: &BTreeSet<String>) -> TrendSeries {
    let mut series = TrendSeries::new();
    for r in records {
        if !selected.contains(&r.class_name) {
            continue;
        }
        series
            .entry(r.class_name)
            .or_default()
            .push((r.timestamp, r.total));
    }
    for points in series.values_mut() {
        points.sort_by_key(|(t, _)| *t);
    }
    series
}

struct Axes {
    t0: i64,
    t_span: f32,
    y_max: u32,
}

impl Axes {
    fn new(series: &TrendSeries) -> Option<Self> {
        let points = series.values().flatten();
        let t_min = points.clone().map(|(t, _)| t.and_utc().timestamp()).min()?;
        let t_max = points.clone().map(|(t, _)| t.and_utc().timestamp()).max()?;
        let y_max = points.map(|(_, v)| *v).max().unwrap_or(0).max(1);
        Some(Self {
            t0: t_min,
            t_span: ((t_max - t_min) as f32).max(1.0),
            y_max,
        })
    }

    fn x(&self, t: &NaiveDateTime) -> f32 {
        let plot_w = WIDTH as f32 - MARGIN_LEFT - MARGIN_RIGHT;
        MARGIN_LEFT + (t.and_utc().timestamp() - self.t0) as f32 / self.t_span * plot_w
    }

    fn y(&self, v: u32) -> f32 {
        let plot_h = HEIGHT as f32 - MARGIN_TOP - MARGIN_BOTTOM;
        HEIGHT as f32 - MARGIN_BOTTOM - v as f32 / self.y_max as f32 * plot_h
    }
}

fn dashed_line(img: &mut RgbImage, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    let dash = 8.0;
    let mut s = 0.0;
    while s < len {
        let e = (s + dash).min(len);
        let a = (from.0 + dx * s / len, from.1 + dy * s / len);
        let b = (from.0 + dx * e / len, from.1 + dy * e / len);
        draw_line_segment_mut(img, a, b, color);
        s += dash * 2.0;
    }
}

fn label(img: &mut RgbImage, font: Option<&FontVec>, x: i32, y: i32, scale: f32, s: &str) {
    if let Some(font) = font {
        draw_text_mut(img, AXIS, x, y, PxScale::from(scale), font, s);
    }
}

fn label_width(font: Option<&FontVec>, scale: f32, s: &str) -> i32 {
    font.map(|f| text_size(PxScale::from(scale), f, s).0 as i32)
        .unwrap_or(0)
}

/// 绘制趋势折线图, 无数据时返回 None
pub fn render_trend(series: &TrendSeries, font: Option<&FontVec>) -> Option<RgbImage> {
    let axes = Axes::new(series)?;
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let left = MARGIN_LEFT;
    let right = WIDTH as f32 - MARGIN_RIGHT;
    let top = MARGIN_TOP;
    let bottom = HEIGHT as f32 - MARGIN_BOTTOM;

    // 网格与纵轴刻度
    let y_step = (axes.y_max / 10).max(1);
    let mut v = 0;
    while v <= axes.y_max {
        let y = axes.y(v);
        dashed_line(&mut img, (left, y), (right, y), GRID);
        let s = v.to_string();
        label(&mut img, font, left as i32 - 12 - label_width(font, 18.0, &s), y as i32 - 9, 18.0, &s);
        v += y_step;
    }
    let x_ticks = 8;
    for i in 0..=x_ticks {
        let x = left + (right - left) * i as f32 / x_ticks as f32;
        dashed_line(&mut img, (x, top), (x, bottom), GRID);
        let secs = axes.t0 + (axes.t_span * i as f32 / x_ticks as f32) as i64;
        if let Some(t) = chrono::DateTime::from_timestamp(secs, 0) {
            let s = t.naive_utc().format("%H:%M:%S").to_string();
            label(&mut img, font, x as i32 - 35, bottom as i32 + 12, 18.0, &s);
        }
    }

    // 坐标轴
    draw_line_segment_mut(&mut img, (left, bottom), (right, bottom), AXIS);
    draw_line_segment_mut(&mut img, (left, top), (left, bottom), AXIS);

    // 折线 + 圆点
    for (i, points) in series.values().enumerate() {
        let color = Rgb(palette_color(i));
        let mapped: Vec<(f32, f32)> = points
            .iter()
            .map(|(t, v)| (axes.x(t), axes.y(*v)))
            .collect();
        for pair in mapped.windows(2) {
            for off in [-1.0, 0.0, 1.0] {
                draw_line_segment_mut(
                    &mut img,
                    (pair[0].0, pair[0].1 + off),
                    (pair[1].0, pair[1].1 + off),
                    color,
                );
            }
        }
        for (x, y) in &mapped {
            draw_filled_circle_mut(&mut img, (*x as i32, *y as i32), 4, color);
        }
    }

    // 标题与轴标签
    let title = "目标检测数量趋势图";
    let tw = label_width(font, 32.0, title);
    label(&mut img, font, (WIDTH as i32 - tw) / 2, 18, 32.0, title);
    label(&mut img, font, (WIDTH as i32) / 2 - 20, HEIGHT as i32 - 60, 22.0, "时间");
    label(&mut img, font, 10, top as i32 - 40, 22.0, "目标数量");

    // 图例
    if font.is_some() {
        let legend_x = left as i32 + 20;
        let mut legend_y = top as i32 + 15;
        let legend_w = 40 + series
            .keys()
            .map(|k| label_width(font, 20.0, k))
            .max()
            .unwrap_or(0) as u32
            + 20;
        let legend_h = series.len() as u32 * 28 + 10;
        draw_filled_rect_mut(
            &mut img,
            Rect::at(legend_x - 10, legend_y - 8).of_size(legend_w, legend_h),
            BACKGROUND,
        );
        draw_hollow_rect_mut(
            &mut img,
            Rect::at(legend_x - 10, legend_y - 8).of_size(legend_w, legend_h),
            GRID,
        );
        for (i, name) in series.keys().enumerate() {
            let color = Rgb(palette_color(i));
            draw_filled_rect_mut(&mut img, Rect::at(legend_x, legend_y + 6).of_size(24, 4), color);
            label(&mut img, font, legend_x + 34, legend_y - 2, 20.0, name);
            legend_y += 28;
        }
    }

    Some(img)
}

/// 读取最新会话记录并保存 `object_trend_<时间>.png`
pub fn plot_trends(
    results_dir: impl AsRef<Path>,
    selected: &BTreeSet<String>,
    font: Option<&FontVec>,
) -> AppResult<Option<PathBuf>> {
    let dir = results_dir.as_ref();
    let Some(latest) = latest_session_csv(dir) else {
        tracing::warn!("⚠️  未找到检测结果文件！");
        return Ok(None);
    };
    tracing::info!("📈 正在处理文件: {}", latest.display());

    let series = group_by_class(read_records(&latest)?, selected);
    let Some(img) = render_trend(&series, font) else {
        tracing::info!("检测结果文件中没有可绘制的数据");
        return Ok(None);
    };

    let out = dir.join(format!("object_trend_{}.png", gen_time_string("_")));
    img.save(&out)
        .map_err(|e| AppError::Chart(format!("{}: {}", out.display(), e)))?;
    tracing::info!("✅ 趋势图已保存到: {}", out.display());
    Ok(Some(out))
}
