use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// タイトル先頭のハッシュタグ (`#tag`) にマッチする正規表現。
static LEADING_HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(#\S+)").expect("hashtag pattern must compile"));

/// カレンダーやスプレッドシートから読み込んだ1件の作業記録。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub begin: DateTime<Utc>,
    /// 計測中のエントリーは`None`。
    pub end: Option<DateTime<Utc>>,
    pub title: String,
    /// タイトル先頭のハッシュタグ。`#`を含む。無い場合は空文字。
    pub tag: String,
    pub description: Option<String>,
    pub duration: Duration,
}

impl TimeEntry {
    /// 新しい`TimeEntry`を返す。
    ///
    /// タグはタイトルから、作業時間は`end - begin`から求める。
    /// 終了していないエントリーの作業時間は0とする。
    ///
    /// # Arguments
    ///
    /// * `begin` - 開始日時
    /// * `end` - 終了日時
    /// * `title` - タイトル
    pub fn new(begin: DateTime<Utc>, end: Option<DateTime<Utc>>, title: &str) -> Self {
        let duration = end.map(|end| end - begin).unwrap_or_else(Duration::zero);
        Self {
            begin,
            end,
            title: title.to_string(),
            tag: extract_tag(title),
            description: None,
            duration,
        }
    }

    /// 終了日時。記録に無い場合は、作業時間があれば開始日時 + 作業時間とする。
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.end
            .or_else(|| (!self.duration.is_zero()).then(|| self.begin + self.duration))
    }

    /// 計測中 (終了日時も作業時間も無い) かどうか。
    pub fn is_running(&self) -> bool {
        self.effective_end().is_none()
    }
}

/// タイトル先頭のハッシュタグを取り出す。
///
/// 先頭以外にあるハッシュタグは対象外とする。
pub fn extract_tag(title: &str) -> String {
    LEADING_HASHTAG
        .captures(title)
        .and_then(|captures| captures.get(1))
        .map(|tag| tag.as_str().to_string())
        .unwrap_or_default()
}

/// タグの先頭に`#`が無ければ付与する。
pub fn normalize_tag(tag: &str) -> String {
    if tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{}", tag)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    use super::{extract_tag, normalize_tag, TimeEntry};

    #[rstest]
    #[case::leading("#tuttle refactoring", "#tuttle")]
    #[case::only_tag("#tuttle", "#tuttle")]
    #[case::leading_space("  #tuttle review", "#tuttle")]
    #[case::with_dash("#acme-web standup", "#acme-web")]
    #[case::not_leading("standup #tuttle", "")]
    #[case::no_tag("standup", "")]
    #[case::empty("", "")]
    fn test_extract_tag(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(extract_tag(title), expected);
    }

    #[rstest]
    #[case("#tuttle", "#tuttle")]
    #[case("tuttle", "#tuttle")]
    fn test_normalize_tag(#[case] tag: &str, #[case] expected: &str) {
        assert_eq!(normalize_tag(tag), expected);
    }

    #[test]
    fn test_new_finished_entry() {
        let begin = Utc.with_ymd_and_hms(2023, 4, 12, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 4, 12, 12, 30, 0).unwrap();

        let entry = TimeEntry::new(begin, Some(end), "#tuttle invoices");

        assert_eq!(entry.tag, "#tuttle");
        assert_eq!(entry.duration, Duration::minutes(210));
        assert!(!entry.is_running());
    }

    #[test]
    fn test_new_running_entry() {
        let begin = Utc.with_ymd_and_hms(2023, 4, 12, 9, 0, 0).unwrap();

        let entry = TimeEntry::new(begin, None, "#tuttle invoices");

        assert_eq!(entry.duration, Duration::zero());
        assert!(entry.is_running());
        assert!(entry.effective_end().is_none());
    }

    #[test]
    fn test_entry_without_end_but_duration() {
        let begin = Utc.with_ymd_and_hms(2023, 4, 12, 9, 0, 0).unwrap();
        let mut entry = TimeEntry::new(begin, None, "#tuttle paper log");
        entry.duration = Duration::hours(2);

        assert!(!entry.is_running());
        assert_eq!(
            entry.effective_end(),
            Some(Utc.with_ymd_and_hms(2023, 4, 12, 11, 0, 0).unwrap())
        );
    }
}
