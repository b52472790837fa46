use std::{fs::File, io::Read, path::PathBuf};

use anyhow::{bail, ensure, Context, Result};
use chrono::Duration;
use log::info;
use serde::Deserialize;

use crate::datetime::parse_timestamp;
use crate::time_entry::{normalize_tag, TimeEntry};

/// タイムトラッキングの記録を読み込むためのtrait。
#[cfg_attr(test, mockall::automock)]
pub trait TimeTrackingSource {
    /// 全ての作業記録を読み込む。
    fn read_entries(&self) -> Result<Vec<TimeEntry>>;
}

/// スプレッドシート (CSV) の1行をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct CsvTimeEntry {
    begin: String,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

impl CsvTimeEntry {
    fn into_time_entry(self) -> Result<TimeEntry> {
        let begin = parse_timestamp(&self.begin)?;
        let end = self.end.as_deref().map(parse_timestamp).transpose()?;
        if let Some(end) = end {
            ensure!(end >= begin, "End {} is before begin {}", end, begin);
        }

        let mut entry = TimeEntry::new(begin, end, self.title.as_deref().unwrap_or_default());
        if let Some(tag) = self.tag {
            entry.tag = normalize_tag(&tag);
        }
        entry.description = self.description;
        if let Some(duration) = self.duration {
            entry.duration = parse_duration(&duration)?;
        }

        Ok(entry)
    }
}

/// CSV形式のタイムトラッキングファイル。
///
/// 列は`begin`, `end`, `title`, `tag`, `description`, `duration`。
/// `begin`以外は空欄を許す。
pub struct CsvTimeTrackingFile {
    path: PathBuf,
}

impl CsvTimeTrackingFile {
    /// 新しい`CsvTimeTrackingFile`を返す。
    ///
    /// # Arguments
    ///
    /// * `path` - 読み込むCSVファイルのパス
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TimeTrackingSource for CsvTimeTrackingFile {
    fn read_entries(&self) -> Result<Vec<TimeEntry>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let entries = read_csv(file)
            .with_context(|| format!("Invalid time tracking file: {}", self.path.display()))?;
        info!(
            "Read {} time entries from {}",
            entries.len(),
            self.path.display()
        );

        Ok(entries)
    }
}

/// CSVを読み込み、スキーマを検証しながら作業記録に変換する。
///
/// 不正な行が1つでもあればエラーとする。行番号はヘッダーを除いて1から数える。
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<TimeEntry>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize::<CsvTimeEntry>()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(anyhow::Error::from)
                .and_then(CsvTimeEntry::into_time_entry)
                .with_context(|| format!("Invalid row {}", i + 1))
        })
        .collect()
}

/// `HH:MM`または`HH:MM:SS`形式の作業時間をパースする。
fn parse_duration(s: &str) -> Result<Duration> {
    let parts = s
        .split(':')
        .map(|part| part.trim().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse duration: {}", s))?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [hours, minutes] => (*hours, *minutes, 0),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => bail!("Duration must be HH:MM or HH:MM:SS: {}", s),
    };
    ensure!(
        minutes < 60 && seconds < 60,
        "Minutes and seconds must be below 60: {}",
        s
    );

    Ok(Duration::hours(i64::from(hours))
        + Duration::minutes(i64::from(minutes))
        + Duration::seconds(i64::from(seconds)))
}
