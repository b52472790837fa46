use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::contract::{Contract, Project};
use crate::datetime::local_date;
use crate::invoice::{generate_number, Invoice, InvoiceItem};
use crate::store::{InvoiceRepository, StoreError};
use crate::timesheet::Timesheet;

/// 請求書番号の重複時に再試行する最大回数。
pub const MAX_NUMBER_ATTEMPTS: u32 = 10;

/// 作業記録の無いタイムシートの扱い。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyTimesheetPolicy {
    /// 明細を作らない。
    #[default]
    Skip,
    /// 数量0の明細を作る。
    ZeroItem,
}

/// タイムシートを請求書の明細に変換する。
///
/// 数量は作業時間を契約の請求単位で割ったもので、端数は丸めない。
/// 空のタイムシートは数量0の明細になり、期間は`period_start`から`period_end`とする。
pub fn timesheet_to_invoice_item(timesheet: &Timesheet, contract: &Contract) -> InvoiceItem {
    let unit_millis = Decimal::new(contract.unit_duration().num_milliseconds(), 0);
    let quantity = Decimal::new(timesheet.total_duration().num_milliseconds(), 0)
        .checked_div(unit_millis)
        .unwrap_or(Decimal::ZERO);
    let start_date = timesheet
        .first_begin()
        .map(|begin| local_date(&begin))
        .unwrap_or(timesheet.period_start);
    let end_date = timesheet
        .last_end()
        .map(|end| local_date(&end))
        .or(timesheet.period_end)
        .unwrap_or(timesheet.period_start);

    InvoiceItem {
        start_date,
        end_date,
        quantity,
        unit: contract.unit.to_string(),
        unit_price: contract.rate,
        vat_rate: contract.effective_vat_rate(),
        description: timesheet.item_description.clone(),
    }
}

/// 複数のタイムシートを明細に変換する。
pub fn timesheets_to_invoice_items(
    timesheets: &[Timesheet],
    contract: &Contract,
    policy: EmptyTimesheetPolicy,
) -> Vec<InvoiceItem> {
    timesheets
        .iter()
        .filter(|timesheet| {
            let skip = timesheet.is_empty() && policy == EmptyTimesheetPolicy::Skip;
            if skip {
                info!("Skipping empty timesheet {}", timesheet.title);
            }
            !skip
        })
        .map(|timesheet| timesheet_to_invoice_item(timesheet, contract))
        .collect()
}

/// 請求書を作成し、番号を割り当てる。
pub struct InvoiceGenerator<'a, R: InvoiceRepository> {
    repository: &'a R,
}

impl<'a, R: InvoiceRepository> InvoiceGenerator<'a, R> {
    /// 新しい`InvoiceGenerator`を返す。
    ///
    /// # Arguments
    /// * `repository` - 請求書を保存するリポジトリ
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// 指定した日付の次の通し番号を返す。
    ///
    /// 件数を数えるだけで番号を予約しないため、保存を挟まずに2回呼ぶと同じ値を返す。
    pub fn next_counter(&self, date: NaiveDate) -> Result<u32> {
        let count = self
            .repository
            .count_by_date(date)
            .with_context(|| format!("Failed to count invoices dated {}", date))?;

        count
            .checked_add(1)
            .with_context(|| format!("No invoice number left for {}", date))
    }

    /// 明細から請求書を作成する。保存はしない。
    ///
    /// `counter`が`None`の場合は、その日の請求書の件数 + 1を通し番号とする。
    /// フラグは全て`false`で作成する。
    ///
    /// # Arguments
    ///
    /// * `items` - 明細
    /// * `contract` - 通貨と支払期限に利用する契約
    /// * `project` - 案件
    /// * `date` - 請求日
    /// * `counter` - 通し番号
    pub fn generate_invoice(
        &self,
        items: Vec<InvoiceItem>,
        contract: &Contract,
        project: &Project,
        date: NaiveDate,
        counter: Option<u32>,
    ) -> Result<Invoice> {
        let counter = match counter {
            Some(counter) => counter,
            None => self.next_counter(date)?,
        };
        let due_date = date
            .checked_add_days(Days::new(u64::from(contract.term_of_payment)))
            .with_context(|| format!("Due date out of range for {}", date))?;

        let invoice = Invoice {
            id: None,
            number: generate_number(date, counter),
            date,
            due_date,
            project: project.title.clone(),
            contract: contract.title.clone(),
            client: contract.client.name.clone(),
            client_last_name: contract.client.invoicing_contact.last_name.clone(),
            currency: contract.currency.clone(),
            sent: false,
            paid: false,
            cancelled: false,
            rendered: false,
            items,
        };
        debug!(
            "Generated invoice {} with {} items",
            invoice.number,
            invoice.items.len()
        );

        Ok(invoice)
    }

    /// 請求書を作成して保存する。
    ///
    /// 番号が既に使われていた場合は、番号を振り直して`MAX_NUMBER_ATTEMPTS`回まで再試行する。
    /// `counter`を指定した場合は再試行せずにエラーとする。
    pub fn issue_invoice(
        &self,
        items: Vec<InvoiceItem>,
        contract: &Contract,
        project: &Project,
        date: NaiveDate,
        counter: Option<u32>,
    ) -> Result<Invoice> {
        let mut next = match counter {
            Some(counter) => counter,
            None => self.next_counter(date)?,
        };
        let mut invoice = self.generate_invoice(items, contract, project, date, Some(next))?;

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            match self.repository.store(invoice.clone()) {
                Ok(stored) => {
                    info!("Issued invoice {}", stored.number);
                    return Ok(stored);
                }
                Err(StoreError::DuplicateNumber(number)) if counter.is_none() => {
                    warn!(
                        "Invoice number {} is taken (attempt {}), renumbering",
                        number, attempt
                    );
                    next = self.next_counter(date)?.max(next.saturating_add(1));
                    invoice.number = generate_number(date, next);
                }
                Err(error) => {
                    return Err(error)
                        .with_context(|| format!("Failed to store invoice {}", invoice.number))
                }
            }
        }

        bail!(
            "Could not allocate an invoice number for {} after {} attempts",
            date,
            MAX_NUMBER_ATTEMPTS
        )
    }
}
