// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测记录 CSV: 快照导出与会话日志
//!
//! 表头固定为 `时间戳,类别,总数量`, 含逗号、引号或换行的字段加双引号转义。

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::detection::DetectionInfo;
use crate::error::{AppError, AppResult};
use crate::gen_time_string;

pub const CSV_HEADER: [&str; 3] = ["时间戳", "类别", "总数量"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const SESSION_PREFIX: &str = "object_detection_";

fn export_err(path: &Path) -> impl FnOnce(std::io::Error) -> AppError + '_ {
    move |source| AppError::Export {
        path: path.to_path_buf(),
        source,
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 一行 CSV (含换行符)
pub fn format_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// 解析 CSV 文本, 支持引号内的逗号、转义引号与换行
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// 一帧检测信息对应的 CSV 行: 每个检测一行, 总数为该帧检测数
pub fn detection_rows(timestamp: &str, infos: &[DetectionInfo]) -> Vec<[String; 3]> {
    let total = infos.len().to_string();
    infos
        .iter()
        .map(|info| [timestamp.to_string(), info.class_name.clone(), total.clone()])
        .collect()
}

/// 导出当前帧检测信息到指定文件
pub fn export_snapshot(path: impl AsRef<Path>, infos: &[DetectionInfo]) -> AppResult<usize> {
    let path = path.as_ref();
    if infos.is_empty() {
        return Err(AppError::NoDetectionData);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(export_err(path))?;
    }

    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let rows = detection_rows(&timestamp, infos);

    let file = File::create(path).map_err(export_err(path))?;
    let mut w = BufWriter::new(file);
    w.write_all(format_row(&CSV_HEADER).as_bytes())
        .map_err(export_err(path))?;
    for row in &rows {
        w.write_all(format_row(row).as_bytes())
            .map_err(export_err(path))?;
    }
    w.flush().map_err(export_err(path))?;

    tracing::info!("💾 已导出 {} 条检测记录到 {}", rows.len(), path.display());
    Ok(rows.len())
}

/// 会话日志: 启动时创建, 每帧追加
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// 在结果目录创建 `object_detection_<时间>.csv` 并写入表头
    pub fn create(results_dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = results_dir.as_ref();
        fs::create_dir_all(dir).map_err(export_err(dir))?;
        let path = dir.join(format!("{}{}.csv", SESSION_PREFIX, gen_time_string("_")));
        fs::write(&path, format_row(&CSV_HEADER)).map_err(export_err(&path))?;
        tracing::info!("📝 检测记录文件: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一帧的检测记录, 返回写入行数
    pub fn append(&self, infos: &[DetectionInfo]) -> AppResult<usize> {
        if infos.is_empty() {
            return Ok(0);
        }
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.append_at(&timestamp, infos)
    }

    fn append_at(&self, timestamp: &str, infos: &[DetectionInfo]) -> AppResult<usize> {
        let rows = detection_rows(timestamp, infos);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(export_err(&self.path))?;
        let text: String = rows.iter().map(|row| format_row(row)).collect();
        file.write_all(text.as_bytes())
            .map_err(export_err(&self.path))?;
        Ok(rows.len())
    }
}

/// 一条已解析的检测记录
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecord {
    pub timestamp: NaiveDateTime,
    pub class_name: String,
    pub total: u32,
}

/// 读取检测记录, 跳过表头与无法解析的行
pub fn read_records(path: impl AsRef<Path>) -> AppResult<Vec<CsvRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(export_err(path))?;
    let mut records = Vec::new();
    for row in parse_csv(&text).into_iter().skip(1) {
        let [ts, class_name, total] = row.as_slice() else {
            continue;
        };
        let (Ok(timestamp), Ok(total)) = (
            NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT),
            total.trim().parse::<u32>(),
        ) else {
            tracing::debug!("跳过无法解析的记录: {:?}", row);
            continue;
        };
        records.push(CsvRecord {
            timestamp,
            class_name: class_name.clone(),
            total,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infos(names: &[&str]) -> Vec<DetectionInfo> {
        names
            .iter()
            .map(|n| DetectionInfo {
                class_name: n.to_string(),
                confidence: 0.5,
            })
            .collect()
    }

    #[test]
    fn header_is_fixed() {
        assert_eq!(format_row(&CSV_HEADER), "时间戳,类别,总数量\n");
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        let line = format_row(&["a,b", "say \"hi\"", "plain"]);
        assert_eq!(line, "\"a,b\",\"say \"\"hi\"\"\",plain\n");
        assert_eq!(
            parse_csv(&line),
            vec![vec!["a,b".to_string(), "say \"hi\"".into(), "plain".into()]]
        );
    }

    #[test]
    fn parser_handles_quoted_newlines_and_crlf() {
        let rows = parse_csv("x,\"line1\nline2\"\r\ny,z");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], "line1\nline2");
        assert_eq!(rows[1], vec!["y".to_string(), "z".to_string()]);
    }

    #[test]
    fn snapshot_without_data_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_snapshot(dir.path().join("out.csv"), &[]).unwrap_err();
        assert!(matches!(err, AppError::NoDetectionData));
        assert_eq!(err.to_string(), "没有检测数据可保存");
    }

    #[test]
    fn snapshot_writes_one_row_per_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let n = export_snapshot(&path, &infos(&["bird", "bird", "cat"])).unwrap();
        assert_eq!(n, 3);
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.total == 3));
        assert_eq!(records[2].class_name, "cat");
    }

    #[test]
    fn session_log_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::create(dir.path()).unwrap();
        let name = log.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(SESSION_PREFIX) && name.ends_with(".csv"));

        log.append_at("2025-01-01 10:00:00", &infos(&["bird"])).unwrap();
        log.append_at("2025-01-01 10:00:01", &infos(&["bird", "crow"])).unwrap();
        assert_eq!(log.append(&[]).unwrap(), 0);

        let records = read_records(log.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].total, 1);
        assert_eq!(records[2].class_name, "crow");
        assert_eq!(records[2].total, 2);
    }

    #[test]
    fn reader_skips_malformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        fs::write(
            &path,
            "时间戳,类别,总数量\nbad,bird,1\n2025-01-01 10:00:00,bird,2\n2025-01-01 10:00:00,bird\n",
        )
        .unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total, 2);
    }
}
