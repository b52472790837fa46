use anyhow::{bail, ensure, Result};
use chrono::NaiveDate;
use log::info;

use crate::config::Config;
use crate::datetime::{parse_date, today};
use crate::invoice::Invoice;
use crate::invoicing::{timesheets_to_invoice_items, EmptyTimesheetPolicy, InvoiceGenerator};
use crate::store::InvoiceRepository;
use crate::timesheet_command::{TimesheetArgs, TimesheetCommand};
use crate::timetracking::TimeTrackingSource;

/// タイムシートから請求書を作成するための引数。
#[derive(Debug, clap::Args)]
pub struct InvoiceArgs {
    #[clap(flatten)]
    pub timesheet: TimesheetArgs,

    #[clap(
        long = "date",
        help = "Invoice date in the format YYYY-MM-DD (default: today)",
        parse(try_from_str = parse_date),
    )]
    pub date: Option<NaiveDate>,

    #[clap(long = "counter", help = "Per-day invoice counter (default: next free one)")]
    pub counter: Option<u32>,

    #[clap(long = "keep-empty", help = "Bill a zero-quantity item when no time was tracked")]
    pub keep_empty: bool,
}

pub struct InvoiceCommand<'a, S: TimeTrackingSource, R: InvoiceRepository> {
    source: &'a S,
    repository: &'a R,
    config: &'a Config,
}

impl<'a, S: TimeTrackingSource, R: InvoiceRepository> InvoiceCommand<'a, S, R> {
    /// 新しい`InvoiceCommand`を返す。
    ///
    /// # Arguments
    /// * `source` - 作業記録の読み込み元
    /// * `repository` - 請求書の保存先
    /// * `config` - 案件と契約の設定
    pub fn new(source: &'a S, repository: &'a R, config: &'a Config) -> Self {
        Self {
            source,
            repository,
            config,
        }
    }

    /// `invoice`サブコマンドの処理を行う。
    ///
    /// タイムシートを作成し、案件の契約に従って請求書を作成して保存する。
    /// 日付が指定されていない場合は、Localタイムゾーンで今日の日付を利用する。
    pub fn run(&self, args: &InvoiceArgs) -> Result<Invoice> {
        if let Some(counter) = args.counter {
            ensure!(counter > 0, "Invoice counter starts at 1");
        }
        let project = self.config.project_by_tag(&args.timesheet.project)?;
        let contract = self.config.contract_for(project)?;

        let timesheet = TimesheetCommand::new(self.source, self.config).run(&args.timesheet)?;
        let policy = if args.keep_empty {
            EmptyTimesheetPolicy::ZeroItem
        } else {
            EmptyTimesheetPolicy::Skip
        };
        let items = timesheets_to_invoice_items(&[timesheet], contract, policy);
        if items.is_empty() {
            bail!(
                "No time tracked for {} in the given period; use --keep-empty to bill anyway",
                project.tag
            );
        }

        let date = args.date.unwrap_or_else(today);
        info!("Invoice date: {}", date);

        InvoiceGenerator::new(self.repository).issue_invoice(
            items,
            contract,
            project,
            date,
            args.counter,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    use super::{InvoiceArgs, InvoiceCommand};
    use crate::datetime::mock_datetime;
    use crate::store::{InvoiceRepository, InvoiceStore};
    use crate::timesheet::fixtures::entry;
    use crate::timesheet_command::fixtures::{april, config};
    use crate::timetracking::MockTimeTrackingSource;

    fn args(date: Option<NaiveDate>, counter: Option<u32>, keep_empty: bool) -> InvoiceArgs {
        InvoiceArgs {
            timesheet: april("#tuttle"),
            date,
            counter,
            keep_empty,
        }
    }

    fn source_with_hours() -> MockTimeTrackingSource {
        let mut source = MockTimeTrackingSource::new();
        source.expect_read_entries().returning(|| {
            Ok(vec![
                entry(12, 9, 3, "#tuttle timesheets"),
                entry(13, 9, 5, "#tuttle invoices"),
            ])
        });
        source
    }

    #[test]
    fn test_invoice_command() {
        let source = source_with_hours();
        let store = InvoiceStore::in_memory();
        let config = config();
        let date = NaiveDate::from_ymd_opt(2023, 5, 2);

        let command = InvoiceCommand::new(&source, &store, &config);
        let invoice = command.run(&args(date, None, false)).unwrap();

        assert_eq!(invoice.number, "2023-05-02-01");
        assert_eq!(invoice.id, Some(1));
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.sum(), Decimal::new(400, 0));
        assert_eq!(invoice.vat_total(), Decimal::new(80, 0));
        assert_eq!(invoice.total(), Decimal::new(480, 0));
        assert_eq!(store.query().unwrap().len(), 1);
    }

    #[test]
    fn test_invoice_command_default_date_is_today() {
        mock_datetime::set_mock_time(Local.with_ymd_and_hms(2023, 5, 2, 10, 0, 0).unwrap().to_utc());
        let source = source_with_hours();
        let store = InvoiceStore::in_memory();
        let config = config();

        let command = InvoiceCommand::new(&source, &store, &config);
        let invoice = command.run(&args(None, None, false));
        mock_datetime::clear_mock_time();

        assert_eq!(invoice.unwrap().number, "2023-05-02-01");
    }

    #[test]
    fn test_invoice_command_with_counter() {
        let source = source_with_hours();
        let store = InvoiceStore::in_memory();
        let config = config();
        let date = NaiveDate::from_ymd_opt(2023, 5, 2);

        let command = InvoiceCommand::new(&source, &store, &config);

        assert_eq!(
            command.run(&args(date, Some(7), false)).unwrap().number,
            "2023-05-02-07"
        );
        assert!(command.run(&args(date, Some(7), false)).is_err());
        assert!(command.run(&args(date, Some(0), false)).is_err());
    }

    #[test]
    fn test_invoice_command_nothing_tracked() {
        let mut source = MockTimeTrackingSource::new();
        source.expect_read_entries().returning(|| Ok(vec![]));
        let store = InvoiceStore::in_memory();
        let config = config();
        let date = NaiveDate::from_ymd_opt(2023, 5, 2);

        let command = InvoiceCommand::new(&source, &store, &config);

        assert!(command.run(&args(date, None, false)).is_err());
        assert!(store.query().unwrap().is_empty());

        let invoice = command.run(&args(date, None, true)).unwrap();

        assert_eq!(invoice.items[0].quantity, Decimal::ZERO);
        assert_eq!(invoice.total(), Decimal::ZERO);
    }
}
