use anyhow::{Context, Result};
use log::info;

use crate::invoice::{Invoice, InvoiceFlag};
use crate::store::InvoiceRepository;

/// 請求書のフラグを反転するための引数。
#[derive(Debug, clap::Args)]
pub struct ToggleArgs {
    #[clap(short = 'i', long = "id", help = "Id of the invoice, as shown by `list`")]
    pub id: u64,

    #[clap(arg_enum, help = "Flag to toggle")]
    pub flag: InvoiceFlag,
}

pub struct ToggleCommand<'a, R: InvoiceRepository> {
    repository: &'a R,
}

impl<'a, R: InvoiceRepository> ToggleCommand<'a, R> {
    /// 新しい`ToggleCommand`を返す。
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// `toggle`サブコマンドの処理を行う。
    ///
    /// 他のフラグの状態に関わらず反転して保存する。
    pub fn run(&self, args: &ToggleArgs) -> Result<Invoice> {
        let mut invoice = self
            .repository
            .query_by_id(args.id)
            .context("Failed to read invoice")?
            .with_context(|| format!("No invoice with id {}", args.id))?;

        invoice.toggle(args.flag);
        let invoice = self
            .repository
            .store(invoice)
            .with_context(|| format!("Failed to update invoice {}", args.id))?;
        info!(
            "Invoice {} toggled {:?}, now {}",
            invoice.number,
            args.flag,
            invoice.status()
        );

        Ok(invoice)
    }
}
