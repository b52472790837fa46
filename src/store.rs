use std::{
    cell::RefCell,
    collections::{BTreeMap, HashSet},
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::invoice::Invoice;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invoice number {0} is already taken")]
    DuplicateNumber(String),
    #[error("no invoice with id {0}")]
    NotFound(u64),
    #[error("too many invoices dated {0}")]
    CounterOverflow(NaiveDate),
    #[error("corrupt invoice store: {0}")]
    Corrupt(String),
    #[error("failed to access invoice store: {0}")]
    Io(#[from] io::Error),
    #[error("invalid invoice store: {0}")]
    Json(#[from] serde_json::Error),
}

/// 請求書を永続化するためのtrait。
#[cfg_attr(test, mockall::automock)]
pub trait InvoiceRepository {
    /// 請求書を保存する。
    ///
    /// `id`が無ければ新しいidを割り当てて追加し、あれば置き換える。
    /// 他の請求書と番号が重複する場合は`StoreError::DuplicateNumber`を返す。
    fn store(&self, invoice: Invoice) -> Result<Invoice, StoreError>;

    /// 全ての請求書をid順に返す。
    fn query(&self) -> Result<Vec<Invoice>, StoreError>;

    fn query_by_id(&self, id: u64) -> Result<Option<Invoice>, StoreError>;

    fn delete_by_id(&self, id: u64) -> Result<(), StoreError>;

    /// 指定した日付の請求書の件数を返す。
    fn count_by_date(&self, date: NaiveDate) -> Result<u32, StoreError>;
}

/// JSONファイルの中身。
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    invoices: Vec<Invoice>,
}

enum Storage {
    Memory(RefCell<BTreeMap<u64, Invoice>>),
    File(PathBuf),
}

/// 請求書ストア。
///
/// JSONファイルのストアは操作の度にロックを取ってファイルを読み直すため、
/// 同じファイルを開いた複数のプロセスから使ってもよい。
/// 変更は一時ファイルに書いてから置き換えるので、失敗しても元のファイルは壊れない。
pub struct InvoiceStore {
    storage: Storage,
}

impl InvoiceStore {
    /// メモリ上だけのストアを返す。
    pub fn in_memory() -> Self {
        Self {
            storage: Storage::Memory(RefCell::new(BTreeMap::new())),
        }
    }

    /// JSONファイルのストアを開く。ファイルが無い場合は空のストアとする。
    ///
    /// 既存のファイルにidの無い請求書や重複したid・番号があれば`StoreError::Corrupt`を返す。
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        fs::create_dir_all(parent_dir(&path))?;

        let invoices = {
            let _lock = lock(&path, false)?;
            read_invoices(&path)?
        };
        info!(
            "Opened invoice store {} with {} invoices",
            path.display(),
            invoices.len()
        );

        Ok(Self {
            storage: Storage::File(path),
        })
    }

    /// 現在の請求書を読み込む。
    fn read(&self) -> Result<BTreeMap<u64, Invoice>, StoreError> {
        match &self.storage {
            Storage::Memory(invoices) => Ok(invoices.borrow().clone()),
            Storage::File(path) => {
                let _lock = lock(path, false)?;
                read_invoices(path)
            }
        }
    }

    /// 最新の請求書に`change`を適用して保存する。
    ///
    /// `change`がエラーを返した場合は何も保存しない。
    fn update<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<u64, Invoice>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &self.storage {
            Storage::Memory(invoices) => {
                let mut next = invoices.borrow().clone();
                let result = change(&mut next)?;
                *invoices.borrow_mut() = next;
                Ok(result)
            }
            Storage::File(path) => {
                let _lock = lock(path, true)?;
                let mut invoices = read_invoices(path)?;
                let result = change(&mut invoices)?;
                write_invoices(path, &invoices)?;
                Ok(result)
            }
        }
    }
}

impl InvoiceRepository for InvoiceStore {
    fn store(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        let invoice = self.update(move |invoices| {
            let mut invoice = invoice;
            if invoices
                .values()
                .any(|other| other.number == invoice.number && other.id != invoice.id)
            {
                return Err(StoreError::DuplicateNumber(invoice.number));
            }

            let id = match invoice.id {
                Some(id) if invoices.contains_key(&id) => id,
                Some(id) => return Err(StoreError::NotFound(id)),
                None => invoices.keys().next_back().map_or(1, |last| last + 1),
            };
            invoice.id = Some(id);
            invoices.insert(id, invoice.clone());
            Ok(invoice)
        })?;
        debug!(
            "Stored invoice {} as id {}",
            invoice.number,
            invoice.id.unwrap_or_default()
        );

        Ok(invoice)
    }

    fn query(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(self.read()?.into_values().collect())
    }

    fn query_by_id(&self, id: u64) -> Result<Option<Invoice>, StoreError> {
        Ok(self.read()?.remove(&id))
    }

    fn delete_by_id(&self, id: u64) -> Result<(), StoreError> {
        self.update(|invoices| {
            invoices.remove(&id).ok_or(StoreError::NotFound(id))?;
            Ok(())
        })
    }

    fn count_by_date(&self, date: NaiveDate) -> Result<u32, StoreError> {
        let count = self
            .read()?
            .values()
            .filter(|invoice| invoice.date == date)
            .count();

        day_count(count, date)
    }
}

/// 件数を`u32`に変換する。収まらない場合は`StoreError::CounterOverflow`を返す。
fn day_count(count: usize, date: NaiveDate) -> Result<u32, StoreError> {
    u32::try_from(count).map_err(|_| StoreError::CounterOverflow(date))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// ストアの隣にある`.lock`ファイルをロックする。返したファイルを閉じるとロックが外れる。
///
/// ストア本体は置き換えで書き込むため、本体ではなく別のファイルをロックする。
fn lock(path: &Path, exclusive: bool) -> Result<File, StoreError> {
    let mut lock_path = path.as_os_str().to_owned();
    lock_path.push(".lock");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    if exclusive {
        FileExt::lock_exclusive(&file)?;
    } else {
        FileExt::lock_shared(&file)?;
    }

    Ok(file)
}

/// JSONファイルから請求書を読み込む。ファイルが無い場合は空とする。
fn read_invoices(path: &Path) -> Result<BTreeMap<u64, Invoice>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    };
    let file: StoreFile = serde_json::from_slice(&bytes)?;

    let mut invoices = BTreeMap::new();
    let mut numbers = HashSet::new();
    for invoice in file.invoices {
        let id = invoice.id.ok_or_else(|| {
            StoreError::Corrupt(format!("invoice {} has no id", invoice.number))
        })?;
        if invoices.contains_key(&id) {
            return Err(StoreError::Corrupt(format!("id {} appears twice", id)));
        }
        if !numbers.insert(invoice.number.clone()) {
            return Err(StoreError::Corrupt(format!(
                "invoice number {} appears twice",
                invoice.number
            )));
        }
        invoices.insert(id, invoice);
    }

    Ok(invoices)
}

/// 一時ファイルに書き出してから`path`を置き換える。
fn write_invoices(path: &Path, invoices: &BTreeMap<u64, Invoice>) -> Result<(), StoreError> {
    let file = StoreFile {
        invoices: invoices.values().cloned().collect(),
    };
    let mut temp = NamedTempFile::new_in(parent_dir(path))?;
    serde_json::to_writer_pretty(&mut temp, &file)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    debug!("Wrote {} invoices to {}", invoices.len(), path.display());

    Ok(())
}
