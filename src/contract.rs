use std::fmt;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// VAT率が契約で指定されていない場合に利用する既定値 (19%)。
pub const DEFAULT_VAT_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// 請求単位。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minute,
    #[default]
    Hour,
    Day,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
        };
        write!(f, "{}", name)
    }
}

/// 請求サイクル。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cycle {
    Hourly,
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

/// 請求書の宛先となる担当者。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    pub invoicing_contact: Contact,
}

/// クライアントと合意した取引条件。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub title: String,
    pub client: Client,
    /// 請求単位あたりの単価。
    pub rate: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub vat_rate: Option<Decimal>,
    #[serde(default)]
    pub unit: TimeUnit,
    /// 1営業日あたりの時間数。請求単位が`day`の場合に利用する。
    #[serde(default = "default_units_per_workday")]
    pub units_per_workday: u32,
    /// 支払期限までの日数。
    #[serde(default = "default_term_of_payment")]
    pub term_of_payment: u32,
    #[serde(default)]
    pub billing_cycle: Cycle,
    #[serde(default)]
    pub volume: Option<u32>,
}

impl Contract {
    /// 適用するVAT率を返す。未設定の場合は既定値を返す。
    pub fn effective_vat_rate(&self) -> Decimal {
        self.vat_rate.unwrap_or(DEFAULT_VAT_RATE)
    }

    /// 請求単位1つ分の時間を返す。
    ///
    /// `day`は暦日ではなく`units_per_workday`時間とする。
    pub fn unit_duration(&self) -> Duration {
        match self.unit {
            TimeUnit::Minute => Duration::minutes(1),
            TimeUnit::Hour => Duration::hours(1),
            TimeUnit::Day => Duration::hours(i64::from(self.units_per_workday)),
        }
    }
}

/// 案件。タイムトラッキングのタグで作業記録と紐付く。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    /// `#`から始まるタグ。
    pub tag: String,
    /// 請求に利用する契約のタイトル。
    pub contract: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_units_per_workday() -> u32 {
    8
}

fn default_term_of_payment() -> u32 {
    14
}
