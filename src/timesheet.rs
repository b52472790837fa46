use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info};

use crate::contract::Project;
use crate::datetime::local_date;
use crate::time_entry::TimeEntry;

/// 1つの案件について、期間内の作業記録をまとめたもの。
#[derive(Clone, Debug, PartialEq)]
pub struct Timesheet {
    pub title: String,
    pub project_title: String,
    pub project_tag: String,
    pub period_start: NaiveDate,
    /// `None`の場合は終わりの無い期間。
    pub period_end: Option<NaiveDate>,
    /// 請求書の明細に記載する説明。
    pub item_description: String,
    /// 開始日時の昇順。
    pub entries: Vec<TimeEntry>,
}

impl Timesheet {
    /// 作業時間の合計を返す。エントリーが無い場合は0。
    pub fn total_duration(&self) -> Duration {
        self.entries
            .iter()
            .fold(Duration::zero(), |total, entry| total + entry.duration)
    }

    /// 対象となる作業記録が1件も無いかどうか。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Localタイムゾーンの日ごとの作業時間を返す。
    pub fn daily_durations(&self) -> BTreeMap<NaiveDate, Duration> {
        self.entries
            .iter()
            .fold(BTreeMap::new(), |mut accumulate, entry| {
                *accumulate
                    .entry(local_date(&entry.begin))
                    .or_insert_with(Duration::zero) += entry.duration;
                accumulate
            })
    }

    /// 最初の作業の開始日時。
    pub fn first_begin(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|entry| entry.begin).min()
    }

    /// 最後の作業の終了日時。
    pub fn last_end(&self) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter_map(|entry| entry.effective_end())
            .max()
    }
}

/// 作業記録から案件のタイムシートを作成する。
///
/// 案件のタグと一致し、開始日が`period_start`から`period_end`まで (両端を含む) の
/// 作業記録を集める。終了日時も作業時間も無い計測中の作業記録は集計対象外とする。
/// 終了日時が無くても作業時間が記録されていれば集計する。
/// 一致する作業記録が無い場合は空のタイムシートを返す。
///
/// # Arguments
///
/// * `source_data` - 全ての作業記録
/// * `project` - 対象の案件
/// * `period_start` - 期間の開始日
/// * `period_end` - 期間の終了日。`None`の場合は上限無し
/// * `item_description` - 請求書の明細に記載する説明
pub fn generate_timesheet(
    source_data: &[TimeEntry],
    project: &Project,
    period_start: NaiveDate,
    period_end: Option<NaiveDate>,
    item_description: &str,
) -> Result<Timesheet> {
    if let Some(period_end) = period_end {
        ensure!(
            period_start <= period_end,
            "Period start {} is after period end {}",
            period_start,
            period_end
        );
    }

    let mut entries: Vec<TimeEntry> = source_data
        .iter()
        .filter(|entry| entry.tag == project.tag && !entry.is_running())
        .filter(|entry| {
            let date = local_date(&entry.begin);
            date >= period_start && period_end.map_or(true, |end| date <= end)
        })
        .cloned()
        .collect();
    entries.sort_by_key(|entry| entry.begin);
    debug!(
        "{} of {} entries match {}",
        entries.len(),
        source_data.len(),
        project.tag
    );

    let title = match period_end {
        Some(period_end) => format!("{} {} - {}", project.title, period_start, period_end),
        None => format!("{} since {}", project.title, period_start),
    };
    let timesheet = Timesheet {
        title,
        project_title: project.title.clone(),
        project_tag: project.tag.clone(),
        period_start,
        period_end,
        item_description: item_description.to_string(),
        entries,
    };
    info!(
        "Timesheet {}: {} entries, {} minutes",
        timesheet.title,
        timesheet.entries.len(),
        timesheet.total_duration().num_minutes()
    );

    Ok(timesheet)
}
