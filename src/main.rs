use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::{info, LevelFilter};

mod config;
mod console;
mod contract;
mod datetime;
mod invoice;
mod invoice_command;
mod invoicing;
mod store;
mod time_entry;
mod timesheet;
mod timesheet_command;
mod timetracking;
mod toggle_command;

use config::Config;
use console::{ConsoleMarkdownList, ConsolePresenter};
use invoice_command::{InvoiceArgs, InvoiceCommand};
use store::{InvoiceRepository, InvoiceStore};
use timesheet_command::{TimesheetArgs, TimesheetCommand};
use timetracking::CsvTimeTrackingFile;
use toggle_command::{ToggleArgs, ToggleCommand};

/// タイムシートと請求書を作成するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- timesheet --source time.csv --project '#tuttle' --from 2023-04-01 --to 2023-04-30
/// $ cargo run -- invoice --source time.csv --project '#tuttle' --from 2023-04-01 --to 2023-04-30
/// $ cargo run -- list
/// $ cargo run -- toggle --id 1 paid
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'c',
        long = "config",
        help = "Config file with contracts and projects (default: $TUTTLE_CONFIG or the user config dir)",
        parse(from_os_str)
    )]
    config: Option<PathBuf>,

    #[clap(
        long = "store",
        help = "Invoice store (default: $TUTTLE_STORE or the user data dir)",
        parse(from_os_str)
    )]
    store: Option<PathBuf>,

    #[clap(short = 'v', long = "verbose", help = "Show debug logs")]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Show the timesheet of a project
    Timesheet(TimesheetArgs),
    /// Create and store an invoice from tracked time
    Invoice(InvoiceArgs),
    /// List stored invoices
    List,
    /// Toggle a flag of a stored invoice
    Toggle(ToggleArgs),
    /// Delete a stored invoice
    Delete {
        #[clap(short = 'i', long = "id", help = "Id of the invoice, as shown by `list`")]
        id: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(args.verbose)?;

    let mut stdout = io::stdout();
    let mut presenter = ConsoleMarkdownList::new(&mut stdout);
    match args.subcommand {
        SubCommands::Timesheet(timesheet) => {
            let config = load_config(args.config)?;
            let source = CsvTimeTrackingFile::new(&timesheet.source);
            let result = TimesheetCommand::new(&source, &config)
                .run(&timesheet)
                .context("Failed to create timesheet")?;
            presenter.show_timesheet(&result)?;
        }
        SubCommands::Invoice(invoice) => {
            let config = load_config(args.config)?;
            let store = open_store(args.store)?;
            let source = CsvTimeTrackingFile::new(&invoice.timesheet.source);
            let result = InvoiceCommand::new(&source, &store, &config)
                .run(&invoice)
                .context("Failed to create invoice")?;
            presenter.show_invoice(&result)?;
        }
        SubCommands::List => {
            let store = open_store(args.store)?;
            let invoices = store.query().context("Failed to read invoices")?;
            presenter.show_invoices(&invoices)?;
        }
        SubCommands::Toggle(toggle) => {
            let store = open_store(args.store)?;
            let result = ToggleCommand::new(&store)
                .run(&toggle)
                .context("Failed to toggle invoice flag")?;
            presenter.show_invoice(&result)?;
        }
        SubCommands::Delete { id } => {
            let store = open_store(args.store)?;
            store
                .delete_by_id(id)
                .with_context(|| format!("Failed to delete invoice {}", id))?;
            info!("Deleted invoice {}", id);
        }
    }

    Ok(())
}

/// ログの出力先と形式を設定する。
///
/// 標準エラー出力に、レベルごとに色を付けて出力する。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")
}

fn load_config(arg: Option<PathBuf>) -> Result<Config> {
    let path = config::config_path(arg)?;
    Config::load(&path)
}

fn open_store(arg: Option<PathBuf>) -> Result<InvoiceStore> {
    let path = config::store_path(arg)?;
    InvoiceStore::open(&path)
        .with_context(|| format!("Failed to open invoice store: {}", path.display()))
}
