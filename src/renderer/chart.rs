// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 数量密度分布图 (egui 画布绘制)

use std::collections::BTreeSet;

use egui_macroquad::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Shape, Stroke};

use crate::recognition::{palette_color, tick_step, ClassSeries, RecognitionLog};

const PAD_LEFT: f32 = 44.0;
const PAD_RIGHT: f32 = 12.0;
const PAD_TOP: f32 = 30.0;
const PAD_BOTTOM: f32 = 52.0;

const AXIS_COLOR: Color32 = Color32::from_rgb(180, 190, 200);
const GRID_COLOR: Color32 = Color32::from_rgba_premultiplied(90, 95, 105, 110);

/// y 轴上限: 向上取整到 5 的倍数, 至少为 5
pub fn y_axis_max(series: &[ClassSeries]) -> usize {
    let max = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .max()
        .unwrap_or(0);
    max.div_ceil(5).max(1) * 5
}

/// 第 i 个样本在绘图区中的位置
pub fn project(plot: Rect, index: usize, len: usize, value: usize, y_max: usize) -> Pos2 {
    let x = if len <= 1 {
        plot.center().x
    } else {
        plot.left() + plot.width() * index as f32 / (len - 1) as f32
    };
    let y = plot.bottom() - plot.height() * value as f32 / y_max.max(1) as f32;
    egui::pos2(x, y)
}

fn color32(i: usize) -> Color32 {
    let [r, g, b] = palette_color(i);
    Color32::from_rgb(r, g, b)
}

/// 在当前 ui 中绘制密度图
pub fn show_density_chart(
    ui: &mut egui::Ui,
    log: &RecognitionLog,
    density_classes: &BTreeSet<String>,
    height: f32,
) {
    let size = egui::vec2(ui.available_width(), height);
    let (response, painter) = ui.allocate_painter(size, Sense::hover());
    let area = response.rect;
    painter.rect_filled(area, 4.0, Color32::from_rgb(28, 30, 36));

    let series = if density_classes.is_empty() {
        Vec::new()
    } else {
        log.series(density_classes)
    };
    let title_pos = egui::pos2(area.center().x, area.top() + 6.0);
    if series.is_empty() {
        painter.text(
            title_pos,
            Align2::CENTER_TOP,
            "数量密度分布（暂无数据）",
            FontId::proportional(16.0),
            Color32::WHITE,
        );
        return;
    }
    painter.text(
        title_pos,
        Align2::CENTER_TOP,
        "数量密度分布",
        FontId::proportional(16.0),
        Color32::WHITE,
    );

    let plot = Rect::from_min_max(
        egui::pos2(area.left() + PAD_LEFT, area.top() + PAD_TOP),
        egui::pos2(area.right() - PAD_RIGHT, area.bottom() - PAD_BOTTOM),
    );
    let y_max = y_axis_max(&series);
    let timestamps = log.timestamps();
    let len = timestamps.len();
    let tick_font = FontId::proportional(11.0);

    // 虚线网格 + y 轴刻度
    for k in 0..=5 {
        let value = y_max * k / 5;
        let y = project(plot, 0, len, value, y_max).y;
        painter.extend(Shape::dashed_line(
            &[egui::pos2(plot.left(), y), egui::pos2(plot.right(), y)],
            Stroke::new(1.0, GRID_COLOR),
            4.0,
            4.0,
        ));
        painter.text(
            egui::pos2(plot.left() - 6.0, y),
            Align2::RIGHT_CENTER,
            value.to_string(),
            tick_font.clone(),
            AXIS_COLOR,
        );
    }

    // x 轴刻度, 最多约 10 个标签
    for (i, ts) in timestamps.iter().enumerate().step_by(tick_step(len)) {
        let x = project(plot, i, len, 0, y_max).x;
        painter.line_segment(
            [egui::pos2(x, plot.bottom()), egui::pos2(x, plot.bottom() + 4.0)],
            Stroke::new(1.0, AXIS_COLOR),
        );
        painter.text(
            egui::pos2(x, plot.bottom() + 6.0),
            Align2::CENTER_TOP,
            *ts,
            tick_font.clone(),
            AXIS_COLOR,
        );
    }

    painter.line_segment(
        [plot.left_bottom(), plot.right_bottom()],
        Stroke::new(1.0, AXIS_COLOR),
    );
    painter.line_segment([plot.left_top(), plot.left_bottom()], Stroke::new(1.0, AXIS_COLOR));
    painter.text(
        egui::pos2(plot.center().x, area.bottom() - 4.0),
        Align2::CENTER_BOTTOM,
        "时间",
        FontId::proportional(12.0),
        AXIS_COLOR,
    );
    painter.text(
        egui::pos2(area.left() + 4.0, plot.top() - 4.0),
        Align2::LEFT_BOTTOM,
        "数量",
        FontId::proportional(12.0),
        AXIS_COLOR,
    );

    for (i, s) in series.iter().enumerate() {
        let color = color32(i);
        let points: Vec<Pos2> = s
            .values
            .iter()
            .enumerate()
            .map(|(j, &v)| project(plot, j, len, v, y_max))
            .collect();
        painter.add(Shape::line(points.clone(), Stroke::new(2.5, color)));
        for p in points {
            painter.circle_filled(p, 3.5, color);
        }
    }

    // 图例 (左上角)
    let mut y = plot.top() + 4.0;
    for (i, s) in series.iter().enumerate() {
        let x = plot.left() + 8.0;
        painter.line_segment(
            [egui::pos2(x, y + 6.0), egui::pos2(x + 16.0, y + 6.0)],
            Stroke::new(2.5, color32(i)),
        );
        painter.text(
            egui::pos2(x + 22.0, y),
            Align2::LEFT_TOP,
            &s.class_name,
            FontId::proportional(12.0),
            Color32::WHITE,
        );
        y += 16.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[usize]) -> ClassSeries {
        ClassSeries {
            class_name: "bird".into(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn y_axis_rounds_up_to_five() {
        assert_eq!(y_axis_max(&[]), 5);
        assert_eq!(y_axis_max(&[series(&[0, 3])]), 5);
        assert_eq!(y_axis_max(&[series(&[5])]), 5);
        assert_eq!(y_axis_max(&[series(&[1]), series(&[11])]), 15);
    }

    #[test]
    fn projection_spans_plot_area() {
        let plot = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(100.0, 50.0));
        assert_eq!(project(plot, 0, 5, 0, 10), egui::pos2(0.0, 50.0));
        assert_eq!(project(plot, 4, 5, 10, 10), egui::pos2(100.0, 0.0));
        assert_eq!(project(plot, 2, 5, 5, 10), egui::pos2(50.0, 25.0));
        // 单个样本居中
        assert_eq!(project(plot, 0, 1, 0, 10).x, 50.0);
    }
}
