use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::config::ARGS;
use crate::config::default::{default_auth_token, default_bind_address, default_interval, default_page_size};
use crate::config::item::{ConcurrentLimit, RateLimit};
use crate::feed::DrainMode;
use crate::youtube::SourceId;

pub static CONFIG_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    ARGS.config_dir
        .clone()
        .unwrap_or_else(|| dirs::config_dir().expect("No config path found").join("watchlog"))
});

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_auth_token")]
    pub auth_token: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// YouTube Data API v3 的 API key
    #[serde(default)]
    pub api_key: String,
    /// 为空时使用配置目录下的 data.sqlite
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub drain_mode: DrainMode,
    /// 后台刷新订阅的间隔，单位为秒
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub subscriptions: Vec<SourceId>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimit>,
    #[serde(default)]
    pub concurrent_limit: ConcurrentLimit,
    #[serde(default)]
    pub version: u64,
}

fn default_rate_limit() -> Option<RateLimit> {
    Some(RateLimit::default())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!("sqlite://{}?mode=rwc", CONFIG_DIR.join("data.sqlite").to_string_lossy()),
        }
    }

    pub fn check(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.api_key.is_empty() {
            errors.push("未设置 YouTube Data API 的 api_key");
        }
        if self.auth_token.is_empty() {
            errors.push("auth_token 不能为空");
        }
        if !(1..=50).contains(&self.page_size) {
            errors.push("page_size 必须在 1 到 50 之间");
        }
        if self.interval == 0 {
            errors.push("interval 必须大于 0");
        }
        if !(self.concurrent_limit.sources > 0 && self.concurrent_limit.dedup_batches > 0) {
            errors.push("sources 和 dedup_batches 允许的并发数必须大于 0");
        }
        if self.rate_limit.as_ref().is_some_and(|r| r.limit == 0 || r.duration == 0) {
            errors.push("rate_limit 的 limit 和 duration 必须大于 0");
        }
        if !errors.is_empty() {
            bail!(
                errors
                    .into_iter()
                    .map(|e| format!("- {}", e))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
        }
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn test_default() -> Self {
        Self {
            api_key: "test-api-key".to_owned(),
            rate_limit: None,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_token: default_auth_token(),
            bind_address: default_bind_address(),
            api_key: String::new(),
            database_url: None,
            page_size: default_page_size(),
            drain_mode: DrainMode::default(),
            interval: default_interval(),
            subscriptions: Vec::new(),
            rate_limit: default_rate_limit(),
            concurrent_limit: ConcurrentLimit::default(),
            version: 0,
        }
    }
}
