use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 請求書の明細1行。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    /// 小数で表したVAT率。0.19は19%。
    pub vat_rate: Decimal,
    pub description: String,
}

impl InvoiceItem {
    /// 税抜金額 (数量 × 単価)。
    pub fn subtotal(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// VAT額 (税抜金額 × VAT率)。
    pub fn vat(&self) -> Decimal {
        self.subtotal() * self.vat_rate
    }
}

/// 請求書のフラグ。
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ArgEnum)]
pub enum InvoiceFlag {
    Sent,
    Paid,
    Cancelled,
    Rendered,
}

/// 表示用の請求書の状態。
///
/// フラグは互いに独立しているため、優先度の高いものを1つ選んで表示する。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// 請求書。
///
/// 金額は保存せず、明細から毎回計算する。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// ストアに保存した時に割り当てられる。
    #[serde(default)]
    pub id: Option<u64>,
    pub number: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub project: String,
    pub contract: String,
    pub client: String,
    pub client_last_name: String,
    pub currency: String,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub rendered: bool,
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    /// 税抜合計。
    pub fn sum(&self) -> Decimal {
        self.items.iter().map(InvoiceItem::subtotal).sum()
    }

    /// VAT合計。
    pub fn vat_total(&self) -> Decimal {
        self.items.iter().map(InvoiceItem::vat).sum()
    }

    /// 税込合計。
    pub fn total(&self) -> Decimal {
        self.sum() + self.vat_total()
    }

    /// フラグを反転する。
    ///
    /// 遷移の制約は無い。例えばキャンセル済みの請求書を支払済みにすることもできる。
    pub fn toggle(&mut self, flag: InvoiceFlag) {
        let value = match flag {
            InvoiceFlag::Sent => &mut self.sent,
            InvoiceFlag::Paid => &mut self.paid,
            InvoiceFlag::Cancelled => &mut self.cancelled,
            InvoiceFlag::Rendered => &mut self.rendered,
        };
        *value = !*value;
    }

    pub fn status(&self) -> InvoiceStatus {
        if self.cancelled {
            InvoiceStatus::Cancelled
        } else if self.paid {
            InvoiceStatus::Paid
        } else if self.sent {
            InvoiceStatus::Sent
        } else {
            InvoiceStatus::Draft
        }
    }

    /// 出力ファイル名の接頭辞 (`{number}-{姓}`) を返す。
    ///
    /// 姓は最初の単語を小文字にしたもの。
    pub fn prefix(&self) -> String {
        match self.client_last_name.split_whitespace().next() {
            Some(token) => format!("{}-{}", self.number, token.to_lowercase()),
            None => self.number.clone(),
        }
    }
}

/// 請求書番号を生成する。
///
/// 形式は`YYYY-MM-DD-NN`。`NN`はその日の通し番号で、2023-04-12の1件目は`2023-04-12-01`となる。
pub fn generate_number(date: NaiveDate, counter: u32) -> String {
    format!("{}-{:02}", date.format("%Y-%m-%d"), counter)
}

#[cfg(test)]
pub mod fixtures {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{Invoice, InvoiceItem};

    /// テスト用の明細を作成する。
    pub fn item(quantity: Decimal, unit_price: Decimal, vat_rate: Decimal) -> InvoiceItem {
        InvoiceItem {
            start_date: NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 4, 30).unwrap(),
            quantity,
            unit: "hour".to_string(),
            unit_price,
            vat_rate,
            description: "Development".to_string(),
        }
    }

    /// テスト用の請求書を作成する。
    pub fn invoice(number: &str, items: Vec<InvoiceItem>) -> Invoice {
        let date = NaiveDate::parse_from_str(&number[..10], "%Y-%m-%d").unwrap();
        Invoice {
            id: None,
            number: number.to_string(),
            date,
            due_date: date + chrono::Duration::days(14),
            project: "Tuttle".to_string(),
            contract: "Tuttle development".to_string(),
            client: "Heatwave Inc.".to_string(),
            client_last_name: "Tuttle".to_string(),
            currency: "EUR".to_string(),
            sent: false,
            paid: false,
            cancelled: false,
            rendered: false,
            items,
        }
    }
}
