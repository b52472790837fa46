use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::datetime::local_date;
use crate::invoice::Invoice;
use crate::timesheet::Timesheet;

/// Consoleにタイムシートと請求書を表示するためのtrait。
pub trait ConsolePresenter {
    /// タイムシートを日ごとに表示する。
    fn show_timesheet(&mut self, timesheet: &Timesheet) -> Result<()>;

    /// 請求書を明細付きで表示する。
    fn show_invoice(&mut self, invoice: &Invoice) -> Result<()>;

    /// 請求書の一覧を表示する。
    fn show_invoices(&mut self, invoices: &[Invoice]) -> Result<()>;
}

/// Markdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    fn show_timesheet(&mut self, timesheet: &Timesheet) -> Result<()> {
        writeln!(self.writer, "## {}", timesheet.title)?;
        if timesheet.is_empty() {
            writeln!(self.writer, "No time entries.")?;
            return Ok(());
        }

        for (date, duration) in timesheet.daily_durations() {
            writeln!(self.writer, "- {}: {} h", date, format_hours(duration))?;
            for entry in timesheet
                .entries
                .iter()
                .filter(|entry| local_date(&entry.begin) == date)
            {
                let start_str = entry.begin.with_timezone(&Local).format("%H:%M");
                let end_str = entry
                    .effective_end()
                    .map(|end| end.with_timezone(&Local).format("%H:%M").to_string())
                    .unwrap_or_else(|| "now".to_string());
                writeln!(self.writer, "  - {} ~ {}: {}", start_str, end_str, entry.title)
                    .with_context(|| format!("Failed to write time entry: {:?}", entry))?;
            }
        }
        writeln!(
            self.writer,
            "- total: {} h",
            format_hours(timesheet.total_duration())
        )?;

        Ok(())
    }

    fn show_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        let currency = &invoice.currency;
        writeln!(
            self.writer,
            "## Invoice {} ({})",
            invoice.number,
            invoice.status()
        )?;
        writeln!(
            self.writer,
            "- date: {}, due: {}",
            invoice.date, invoice.due_date
        )?;
        writeln!(self.writer, "- client: {}", invoice.client)?;
        writeln!(self.writer, "- project: {}", invoice.project)?;
        writeln!(self.writer, "- file: {}.pdf", invoice.prefix())?;
        writeln!(self.writer, "- items:")?;
        for item in &invoice.items {
            writeln!(
                self.writer,
                "  - {} ~ {} {}: {} {} x {} {} = {} {} (VAT {}%: {} {})",
                item.start_date,
                item.end_date,
                item.description,
                format_amount(item.quantity),
                item.unit,
                format_amount(item.unit_price),
                currency,
                format_amount(item.subtotal()),
                currency,
                (item.vat_rate * Decimal::ONE_HUNDRED).normalize(),
                format_amount(item.vat()),
                currency,
            )
            .with_context(|| format!("Failed to write invoice item: {:?}", item))?;
        }
        writeln!(self.writer, "- sum: {} {}", format_amount(invoice.sum()), currency)?;
        writeln!(
            self.writer,
            "- VAT: {} {}",
            format_amount(invoice.vat_total()),
            currency
        )?;
        writeln!(
            self.writer,
            "- total: {} {}",
            format_amount(invoice.total()),
            currency
        )?;

        Ok(())
    }

    fn show_invoices(&mut self, invoices: &[Invoice]) -> Result<()> {
        if invoices.is_empty() {
            writeln!(self.writer, "No invoices.")?;
            return Ok(());
        }

        for invoice in invoices {
            writeln!(
                self.writer,
                "- [{}] {} {}: {} {} ({})",
                invoice.id.unwrap_or_default(),
                invoice.number,
                invoice.client,
                format_amount(invoice.total()),
                invoice.currency,
                invoice.status()
            )
            .with_context(|| format!("Failed to write invoice: {}", invoice.number))?;
        }

        Ok(())
    }
}

/// 時間数を小数点以下2桁で表す。
fn format_hours(duration: Duration) -> String {
    format_amount(Decimal::new(duration.num_milliseconds(), 0) / Decimal::new(3_600_000, 0))
}

/// 表示用に小数点以下2桁へ四捨五入する。
fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;
    use rust_decimal::Decimal;

    use super::{format_amount, format_hours, ConsoleMarkdownList, ConsolePresenter};
    use crate::contract::fixtures::project;
    use crate::invoice::fixtures::{invoice, item};
    use crate::invoice::Invoice;
    use crate::timesheet::fixtures::entry;
    use crate::timesheet::generate_timesheet;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 4, day).unwrap()
    }

    #[test]
    fn test_show_timesheet() {
        let source = vec![
            entry(12, 13, 5, "#tuttle invoices"),
            entry(12, 9, 3, "#tuttle timesheets"),
            entry(14, 9, 1, "#tuttle review"),
        ];
        let timesheet =
            generate_timesheet(&source, &project(), date(1), Some(date(30)), "Dev").unwrap();
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_timesheet(&timesheet).unwrap();

        let expected = [
            "## Tuttle 2023-04-01 - 2023-04-30\n",
            "- 2023-04-12: 8.00 h\n",
            "  - 09:00 ~ 12:00: #tuttle timesheets\n",
            "  - 13:00 ~ 18:00: #tuttle invoices\n",
            "- 2023-04-14: 1.00 h\n",
            "  - 09:00 ~ 10:00: #tuttle review\n",
            "- total: 9.00 h\n",
        ]
        .concat();
        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    #[test]
    fn test_show_empty_timesheet() {
        let timesheet = generate_timesheet(&[], &project(), date(1), None, "Dev").unwrap();
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_timesheet(&timesheet).unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            "## Tuttle since 2023-04-01\nNo time entries.\n"
        );
    }

    #[test]
    fn test_show_invoice() {
        let invoice = invoice(
            "2023-04-12-01",
            vec![item(
                Decimal::new(10, 0),
                Decimal::new(5000, 2),
                Decimal::new(20, 2),
            )],
        );
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_invoice(&invoice).unwrap();

        let expected = [
            "## Invoice 2023-04-12-01 (draft)\n",
            "- date: 2023-04-12, due: 2023-04-26\n",
            "- client: Heatwave Inc.\n",
            "- project: Tuttle\n",
            "- file: 2023-04-12-01-tuttle.pdf\n",
            "- items:\n",
            "  - 2023-04-01 ~ 2023-04-30 Development: 10.00 hour x 50.00 EUR = 500.00 EUR (VAT 20%: 100.00 EUR)\n",
            "- sum: 500.00 EUR\n",
            "- VAT: 100.00 EUR\n",
            "- total: 600.00 EUR\n",
        ]
        .concat();
        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    #[rstest]
    #[case::no_invoice(vec![], "No invoices.\n")]
    #[case::single(
        vec![numbered(1, "2023-04-12-01", true)],
        "- [1] 2023-04-12-01 Heatwave Inc.: 600.00 EUR (paid)\n",
    )]
    #[case::double(
        vec![numbered(1, "2023-04-12-01", false), numbered(2, "2023-04-12-02", false)],
        "- [1] 2023-04-12-01 Heatwave Inc.: 600.00 EUR (draft)\n- [2] 2023-04-12-02 Heatwave Inc.: 600.00 EUR (draft)\n",
    )]
    fn test_show_invoices(#[case] input: Vec<Invoice>, #[case] expected: &str) {
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_invoices(&input).unwrap();

        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    #[rstest]
    #[case(Duration::minutes(90), "1.50")]
    #[case(Duration::minutes(20), "0.33")]
    #[case(Duration::zero(), "0.00")]
    #[case(Duration::milliseconds(18_000), "0.01")]
    fn test_format_hours(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_hours(duration), expected);
    }

    #[rstest]
    #[case(Decimal::new(5, 0), "5.00")]
    #[case(Decimal::new(12345, 3), "12.35")]
    fn test_format_amount(#[case] amount: Decimal, #[case] expected: &str) {
        assert_eq!(format_amount(amount), expected);
    }

    /// テスト用にidと番号を持つ請求書を作成する。
    fn numbered(id: u64, number: &str, paid: bool) -> Invoice {
        let mut invoice = invoice(
            number,
            vec![item(
                Decimal::new(10, 0),
                Decimal::new(5000, 2),
                Decimal::new(20, 2),
            )],
        );
        invoice.id = Some(id);
        invoice.paid = paid;
        invoice
    }
}
