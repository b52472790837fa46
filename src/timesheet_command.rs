use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::config::Config;
use crate::datetime::parse_date;
use crate::timesheet::{generate_timesheet, Timesheet};
use crate::timetracking::TimeTrackingSource;

/// 案件と期間を指定してタイムシートを作成するための引数。
#[derive(Debug, clap::Args)]
pub struct TimesheetArgs {
    #[clap(
        short = 's',
        long = "source",
        help = "Time tracking spreadsheet (CSV)",
        parse(from_os_str)
    )]
    pub source: PathBuf,

    #[clap(short = 'p', long = "project", help = "Project tag, e.g. #tuttle")]
    pub project: String,

    #[clap(
        short = 'f',
        long = "from",
        help = "First day of the period in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub from: NaiveDate,

    #[clap(
        short = 't',
        long = "to",
        help = "Last day of the period in the format YYYY-MM-DD (default: open-ended)",
        parse(try_from_str = parse_date),
    )]
    pub to: Option<NaiveDate>,

    #[clap(
        short = 'd',
        long = "description",
        help = "Description of the invoice item (default: project description or title)"
    )]
    pub description: Option<String>,
}

pub struct TimesheetCommand<'a, S: TimeTrackingSource> {
    source: &'a S,
    config: &'a Config,
}

impl<'a, S: TimeTrackingSource> TimesheetCommand<'a, S> {
    /// 新しい`TimesheetCommand`を返す。
    ///
    /// # Arguments
    /// * `source` - 作業記録の読み込み元
    /// * `config` - 案件と契約の設定
    pub fn new(source: &'a S, config: &'a Config) -> Self {
        Self { source, config }
    }

    /// `timesheet`サブコマンドの処理を行う。
    ///
    /// 指定されたタグの案件について、期間内の作業記録をタイムシートにまとめる。
    pub fn run(&self, args: &TimesheetArgs) -> Result<Timesheet> {
        let project = self.config.project_by_tag(&args.project)?;
        info!(
            "Project: {}, from: {}, to: {:?}",
            project.title, args.from, args.to
        );

        let entries = self
            .source
            .read_entries()
            .context("Failed to read time entries")?;
        let description = args
            .description
            .clone()
            .or_else(|| project.description.clone())
            .unwrap_or_else(|| project.title.clone());

        generate_timesheet(&entries, project, args.from, args.to, &description)
            .with_context(|| format!("Failed to generate timesheet for {}", project.tag))
    }
}
