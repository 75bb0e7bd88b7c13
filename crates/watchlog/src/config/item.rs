use serde::{Deserialize, Serialize};

/// 并发相关的配置
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConcurrentLimit {
    /// 后台刷新订阅时允许同时拉取的来源数量，单个来源内部始终按页顺序拉取
    pub sources: usize,
    /// 向远端查询已观看记录时允许同时进行的批次数量
    pub dedup_batches: usize,
}

impl Default for ConcurrentLimit {
    fn default() -> Self {
        Self {
            sources: 3,
            dedup_batches: 4,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RateLimit {
    pub limit: usize,
    pub duration: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        // 默认每秒允许请求 5 次
        Self {
            limit: 5,
            duration: 1000,
        }
    }
}
