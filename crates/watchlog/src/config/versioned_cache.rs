use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use arc_swap::ArcSwap;

use crate::config::{Config, VersionedConfig};

/// 由配置派生出的值，配置版本变化时自动重建
pub struct VersionedCache<T> {
    inner: ArcSwap<T>,
    version: AtomicU64,
    builder: fn(&Config) -> Result<T>,
}

impl<T> VersionedCache<T> {
    pub fn new(builder: fn(&Config) -> Result<T>) -> Result<Self> {
        let current_config = VersionedConfig::get().load();
        let initial_value = builder(&current_config)?;
        Ok(Self {
            inner: ArcSwap::from_pointee(initial_value),
            version: AtomicU64::new(current_config.version),
            builder,
        })
    }

    pub fn load_full(&self) -> Arc<T> {
        self.reload_if_needed();
        self.inner.load_full()
    }

    fn reload_if_needed(&self) {
        let current_config = VersionedConfig::get().load();
        let cached_version = self.version.load(Ordering::Acquire);
        if current_config.version != cached_version {
            match (self.builder)(&current_config) {
                Ok(new_value) => {
                    self.inner.store(Arc::new(new_value));
                    self.version.store(current_config.version, Ordering::Release);
                }
                Err(e) => warn!("根据新配置重建缓存失败，继续使用旧值：{:#}", e),
            }
        }
    }
}
