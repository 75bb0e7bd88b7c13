use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use arc_swap::{ArcSwap, Guard};
use tokio::sync::OnceCell;

use crate::config::Config;

pub static VERSIONED_CONFIG: OnceCell<VersionedConfig> = OnceCell::const_new();

pub struct VersionedConfig {
    inner: ArcSwap<Config>,
    path: Option<PathBuf>,
    update_lock: tokio::sync::Mutex<()>,
}

impl VersionedConfig {
    /// 从配置文件初始化全局的 `VersionedConfig`，文件不存在时写入默认配置
    pub fn init(path: &Path) -> Result<()> {
        let mut config = match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .is_none_or(|e| e.kind() != std::io::ErrorKind::NotFound)
                {
                    bail!("加载配置文件 {} 失败：{:#}", path.display(), e);
                }
                let config = Config::default();
                warn!(
                    "配置文件不存在，使用默认配置。生成 auth_token：{}，可使用该 token 调用 API，该信息仅在首次运行时打印",
                    config.auth_token
                );
                config
            }
        };
        // version 本身不具有实际意义，仅用于并发更新时的版本控制，在初始化时可以直接清空
        config.version = 0;
        // 覆盖写回，补全新增的默认字段
        config.save(path)?;
        VERSIONED_CONFIG
            .set(VersionedConfig::new(config, Some(path.to_path_buf())))
            .map_err(|e| anyhow!("VERSIONED_CONFIG has already been initialized: {}", e))?;
        Ok(())
    }

    #[cfg(test)]
    /// 单元测试直接使用测试专用的配置即可
    pub fn get() -> &'static VersionedConfig {
        use std::sync::LazyLock;
        static TEST_CONFIG: LazyLock<VersionedConfig> =
            LazyLock::new(|| VersionedConfig::new(Config::test_default(), None));
        &TEST_CONFIG
    }

    #[cfg(not(test))]
    /// 获取全局的 `VersionedConfig`，如果未初始化则会 panic
    pub fn get() -> &'static VersionedConfig {
        VERSIONED_CONFIG.get().expect("VERSIONED_CONFIG is not initialized")
    }

    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            inner: ArcSwap::from_pointee(config),
            path,
            update_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn load(&self) -> Guard<Arc<Config>> {
        self.inner.load()
    }

    pub fn load_full(&self) -> Arc<Config> {
        self.inner.load_full()
    }

    /// 外部 API 会调用这个方法，版本不匹配或校验失败直接返回错误
    pub async fn update(&self, mut new_config: Config) -> Result<Arc<Config>> {
        let _lock = self.update_lock.lock().await;
        new_config.check()?;
        let old_config = self.inner.load();
        if old_config.version != new_config.version {
            bail!("配置版本不匹配，请刷新后重新提交");
        }
        new_config.version += 1;
        let new_config = Arc::new(new_config);
        if !Arc::ptr_eq(
            &old_config,
            &self.inner.compare_and_swap(&old_config, new_config.clone()),
        ) {
            bail!("配置版本不匹配，请刷新后重新提交");
        }
        if let Some(path) = &self.path {
            new_config.save(path)?;
        }
        Ok(new_config)
    }

    #[cfg(test)]
    /// 不做版本检查直接替换
    pub fn replace(&self, mut new_config: Config) {
        new_config.version = self.inner.load().version + 1;
        self.inner.store(Arc::new(new_config));
    }
}
