// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 数量密度滚动缓冲 (最近 100 个有效样本)

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::detection::DetectionInfo;

/// 缓冲区容量
pub const RECOGNITION_CAPACITY: usize = 100;

/// 横轴最多显示的时间标签数
const MAX_TICKS: usize = 10;

/// tab10 调色板
const TAB10: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

/// 第 i 条曲线的颜色 (RGB)
pub fn palette_color(i: usize) -> [u8; 3] {
    TAB10[i % TAB10.len()]
}

/// 一个密度样本: 时间、总数、各类别数量
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSample {
    pub timestamp: String, // HH:MM:SS
    pub total: usize,
    pub counts: BTreeMap<String, usize>,
}

/// 单个类别的时间序列
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSeries {
    pub class_name: String,
    pub values: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct RecognitionLog {
    samples: VecDeque<RecognitionSample>,
}

impl RecognitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只统计密度类别, 总数为 0 时不记录
    pub fn record(
        &mut self,
        timestamp: impl Into<String>,
        detections: &[DetectionInfo],
        density_classes: &BTreeSet<String>,
    ) -> Option<&RecognitionSample> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for info in detections {
            if density_classes.contains(&info.class_name) {
                *counts.entry(info.class_name.clone()).or_insert(0) += 1;
            }
        }
        let total: usize = counts.values().sum();
        if total == 0 {
            return None;
        }

        self.samples.push_back(RecognitionSample {
            timestamp: timestamp.into(),
            total,
            counts,
        });
        while self.samples.len() > RECOGNITION_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.back()
    }

    pub fn samples(&self) -> &VecDeque<RecognitionSample> {
        &self.samples
    }

    pub fn timestamps(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.timestamp.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 每个密度类别一条序列 (缺失记 0), 全为 0 的类别不返回
    pub fn series(&self, density_classes: &BTreeSet<String>) -> Vec<ClassSeries> {
        density_classes
            .iter()
            .map(|class_name| ClassSeries {
                class_name: class_name.clone(),
                values: self
                    .samples
                    .iter()
                    .map(|s| s.counts.get(class_name).copied().unwrap_or(0))
                    .collect(),
            })
            .filter(|series| series.values.iter().any(|&v| v > 0))
            .collect()
    }
}

/// 横轴标签间隔
pub fn tick_step(len: usize) -> usize {
    (len / MAX_TICKS).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infos(names: &[&str]) -> Vec<DetectionInfo> {
        names
            .iter()
            .map(|n| DetectionInfo {
                class_name: n.to_string(),
                confidence: 0.9,
            })
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts_only_density_classes() {
        let mut log = RecognitionLog::new();
        let sample = log
            .record("12:00:00", &infos(&["bird", "bird", "cat"]), &set(&["bird"]))
            .cloned()
            .unwrap();
        assert_eq!(sample.total, 2);
        assert_eq!(sample.counts.get("bird"), Some(&2));
        assert!(sample.counts.get("cat").is_none());
    }

    #[test]
    fn zero_total_is_not_recorded() {
        let mut log = RecognitionLog::new();
        assert!(log
            .record("12:00:00", &infos(&["cat"]), &set(&["bird"]))
            .is_none());
        assert!(log.record("12:00:01", &[], &set(&["bird"])).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn buffer_never_exceeds_capacity() {
        let mut log = RecognitionLog::new();
        let classes = set(&["bird"]);
        for i in 0..130 {
            log.record(format!("t{}", i), &infos(&["bird"]), &classes);
        }
        assert_eq!(log.len(), RECOGNITION_CAPACITY);
        // 最早的 30 个被淘汰
        assert_eq!(log.samples().front().unwrap().timestamp, "t30");
        assert_eq!(log.samples().back().unwrap().timestamp, "t129");
    }

    #[test]
    fn series_skips_all_zero_classes() {
        let mut log = RecognitionLog::new();
        let classes = set(&["bird", "cat", "dog"]);
        log.record("a", &infos(&["bird"]), &classes);
        log.record("b", &infos(&["cat", "cat"]), &classes);
        let series = log.series(&classes);
        assert_eq!(
            series,
            vec![
                ClassSeries {
                    class_name: "bird".into(),
                    values: vec![1, 0]
                },
                ClassSeries {
                    class_name: "cat".into(),
                    values: vec![0, 2]
                },
            ]
        );
    }

    #[test]
    fn palette_wraps_around() {
        assert_eq!(palette_color(0), [31, 119, 180]);
        assert_eq!(palette_color(10), palette_color(0));
    }

    #[test]
    fn tick_step_limits_labels() {
        assert_eq!(tick_step(0), 1);
        assert_eq!(tick_step(9), 1);
        assert_eq!(tick_step(25), 2);
        assert_eq!(tick_step(100), 10);
    }
}
