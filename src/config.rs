use std::{collections::HashSet, env, fs, path::Path, path::PathBuf};

use anyhow::{bail, ensure, Context, Result};
use log::debug;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::contract::{Contract, Project};
use crate::time_entry::normalize_tag;

/// 設定ファイルの場所を上書きする環境変数。
pub const CONFIG_ENV: &str = "TUTTLE_CONFIG";
/// 請求書ストアの場所を上書きする環境変数。
pub const STORE_ENV: &str = "TUTTLE_STORE";

/// 契約と案件の設定。
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Config {
    /// 設定ファイルを読み込み、検証する。
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!(
            "Loaded {} contracts and {} projects from {}",
            config.contracts.len(),
            config.projects.len(),
            path.display()
        );

        Ok(config)
    }

    /// JSON文字列から設定を読み込み、検証する。
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(content).context("Failed to deserialize config")?;
        config.validate()?;

        Ok(config)
    }

    /// タグから案件を探す。
    ///
    /// `#`の有無は問わない。
    pub fn project_by_tag(&self, tag: &str) -> Result<&Project> {
        let tag = normalize_tag(tag);
        self.projects
            .iter()
            .find(|project| project.tag == tag)
            .with_context(|| format!("No project with tag {}", tag))
    }

    /// 案件が参照する契約を返す。
    pub fn contract_for(&self, project: &Project) -> Result<&Contract> {
        self.contracts
            .iter()
            .find(|contract| contract.title == project.contract)
            .with_context(|| {
                format!(
                    "Project {} refers to unknown contract {}",
                    project.title, project.contract
                )
            })
    }

    fn validate(&self) -> Result<()> {
        let mut titles = HashSet::new();
        for contract in &self.contracts {
            ensure!(
                titles.insert(contract.title.as_str()),
                "Duplicate contract title: {}",
                contract.title
            );
            ensure!(
                contract.rate >= Decimal::ZERO,
                "Contract {} has a negative rate",
                contract.title
            );
            if let Some(vat_rate) = contract.vat_rate {
                ensure!(
                    vat_rate >= Decimal::ZERO && vat_rate < Decimal::ONE,
                    "Contract {} has a VAT rate outside [0, 1): {}",
                    contract.title,
                    vat_rate
                );
            }
            ensure!(
                contract.units_per_workday > 0,
                "Contract {} must have at least one unit per workday",
                contract.title
            );
        }

        let mut tags = HashSet::new();
        for project in &self.projects {
            if !project.tag.starts_with('#') {
                bail!("Project {} has a tag without leading '#': {}", project.title, project.tag);
            }
            ensure!(
                tags.insert(project.tag.as_str()),
                "Duplicate project tag: {}",
                project.tag
            );
            self.contract_for(project)?;
        }

        Ok(())
    }
}

/// 設定ファイルのパスを決める。
///
/// 優先順位はコマンドライン引数、環境変数`TUTTLE_CONFIG`、ユーザーの設定ディレクトリの順。
pub fn config_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    resolve_path(arg, CONFIG_ENV, dirs::config_dir(), "config.json")
}

/// 請求書ストアのパスを決める。
///
/// 優先順位はコマンドライン引数、環境変数`TUTTLE_STORE`、ユーザーのデータディレクトリの順。
pub fn store_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    resolve_path(arg, STORE_ENV, dirs::data_dir(), "invoices.json")
}

fn resolve_path(
    arg: Option<PathBuf>,
    env_key: &str,
    base_dir: Option<PathBuf>,
    file_name: &str,
) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    if let Ok(path) = env::var(env_key) {
        return Ok(PathBuf::from(path));
    }
    let base_dir = base_dir
        .with_context(|| format!("No default directory for {}; set {}", file_name, env_key))?;

    Ok(base_dir.join("tuttle").join(file_name))
}
