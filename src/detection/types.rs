// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统数据结构定义
use std::collections::VecDeque;

use crate::models::Detection;

// ========== 公共常量 ==========

/// 计数统计保留的历史帧数
pub const COUNT_HISTORY_LEN: usize = 100;

/// 默认拥挤阈值
pub const DEFAULT_CROWD_THRESHOLD: u32 = 20;

// ========== 枚举类型 ==========

/// 拥挤状态, 按当前数量占阈值的百分比划分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrowdStatus {
    Normal,   // < 60%
    Warning,  // < 90%
    Critical, // >= 90%
}

impl CrowdStatus {
    pub fn from_count(count: usize, threshold: u32) -> Self {
        let percentage = count as f32 / threshold.max(1) as f32 * 100.0;
        if percentage < 60.0 {
            CrowdStatus::Normal
        } else if percentage < 90.0 {
            CrowdStatus::Warning
        } else {
            CrowdStatus::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CrowdStatus::Normal => "NORMAL",
            CrowdStatus::Warning => "WARNING",
            CrowdStatus::Critical => "CRITICAL",
        }
    }

    /// 状态颜色 (RGB)
    pub fn color(&self) -> [u8; 3] {
        match self {
            CrowdStatus::Normal => [0, 255, 0],
            CrowdStatus::Warning => [255, 165, 0],
            CrowdStatus::Critical => [255, 0, 0],
        }
    }
}

// ========== 数据结构 ==========

/// 单帧检测信息中的一项 (每个保留下来的检测框一项)
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionInfo {
    pub class_name: String,
    pub confidence: f32,
}

/// 一帧处理结果 (检测包装器 → 界面状态)
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// 已筛选到识别类别的检测
    pub detections: Vec<Detection>,
    /// 各类别数量, 按首次出现顺序
    pub class_counts: Vec<(String, usize)>,
    pub total: usize,
}

impl FrameReport {
    /// `cls=n cls=n` 形式的摘要
    pub fn summary_label(&self) -> Option<String> {
        if self.class_counts.is_empty() {
            return None;
        }
        Some(
            self.class_counts
                .iter()
                .map(|(name, n)| format!("{}={}", name, n))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

/// 计数统计 (最近 100 帧)
#[derive(Debug, Clone, Default)]
pub struct CountStats {
    history: VecDeque<usize>,
    max_count: usize,
}

impl CountStats {
    pub fn push(&mut self, count: usize) {
        self.max_count = self.max_count.max(count);
        self.history.push_back(count);
        while self.history.len() > COUNT_HISTORY_LEN {
            self.history.pop_front();
        }
    }

    pub fn current(&self) -> usize {
        self.history.back().copied().unwrap_or(0)
    }

    pub fn max(&self) -> usize {
        self.max_count
    }

    pub fn average(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<usize>() as f32 / self.history.len() as f32
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crowd_status_thresholds() {
        assert_eq!(CrowdStatus::from_count(0, 20), CrowdStatus::Normal);
        assert_eq!(CrowdStatus::from_count(11, 20), CrowdStatus::Normal);
        assert_eq!(CrowdStatus::from_count(12, 20), CrowdStatus::Warning);
        assert_eq!(CrowdStatus::from_count(17, 20), CrowdStatus::Warning);
        assert_eq!(CrowdStatus::from_count(18, 20), CrowdStatus::Critical);
        assert_eq!(CrowdStatus::from_count(40, 20), CrowdStatus::Critical);
    }

    #[test]
    fn zero_threshold_is_treated_as_one() {
        assert_eq!(CrowdStatus::from_count(0, 0), CrowdStatus::Normal);
        assert_eq!(CrowdStatus::from_count(1, 0), CrowdStatus::Critical);
    }

    #[test]
    fn count_stats_keep_last_hundred() {
        let mut stats = CountStats::default();
        for i in 0..150 {
            stats.push(i);
        }
        assert_eq!(stats.len(), COUNT_HISTORY_LEN);
        assert_eq!(stats.current(), 149);
        assert_eq!(stats.max(), 149);
        // 50..150 的平均值
        assert!((stats.average() - 99.5).abs() < 1e-3);
    }

    #[test]
    fn summary_label_joins_counts() {
        let report = FrameReport {
            detections: Vec::new(),
            class_counts: vec![("bird".into(), 3), ("cat".into(), 1)],
            total: 4,
        };
        assert_eq!(report.summary_label().as_deref(), Some("bird=3 cat=1"));
        assert_eq!(FrameReport::default().summary_label(), None);
    }
}
