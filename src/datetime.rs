use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// テスト時に利用するモック時間を取得する。
#[cfg(test)]
pub mod mock_datetime {
    use std::cell::RefCell;

    use super::DateTime;
    use super::Utc;

    thread_local! {
        static MOCK_TIME: RefCell<Option<DateTime<Utc>>> = RefCell::new(None);
    }

    /// モック時間を取得する。
    pub fn now() -> DateTime<Utc> {
        MOCK_TIME.with(|cell| cell.borrow().as_ref().cloned().unwrap_or_else(Utc::now))
    }

    /// モック時間を設定する。
    pub fn set_mock_time(time: DateTime<Utc>) {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = Some(time));
    }

    // 設定したモック時間をクリアする。
    pub fn clear_mock_time() {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = None);
    }
}

#[cfg(test)]
pub use mock_datetime::now;

/// Localタイムゾーンでの今日の日付を取得する。
///
/// 請求書の日付を省略した場合に利用する。
pub fn today() -> NaiveDate {
    now().with_timezone(&Local).date_naive()
}

/// 日付をパースする。
///
/// 形式は`YYYY-MM-DD`。
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}

/// 日時をパースしてUTCに変換する。
///
/// RFC 3339形式、またはLocalタイムゾーンの`YYYY-MM-DD HH:MM[:SS]`形式を受け付ける。
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.to_utc());
    }

    let naive_datetime = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Failed to parse timestamp: {}", s))?;
    let datetime = Local
        .from_local_datetime(&naive_datetime)
        .single()
        .with_context(|| format!("Ambiguous local timestamp: {}", s))?
        .to_utc();

    Ok(datetime)
}

/// UTC日時をLocalタイムゾーンの日付に変換する。
pub fn local_date(datetime: &DateTime<Utc>) -> NaiveDate {
    datetime.with_timezone(&Local).date_naive()
}
