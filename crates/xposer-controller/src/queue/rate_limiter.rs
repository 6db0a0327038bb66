//! 按键指数退避

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;

/// 按键记录失败次数，计算下一次重试的延迟
pub struct RateLimiter<K> {
    /// 退避基数
    base_delay: Duration,
    /// 退避上限
    max_delay: Duration,
    /// 每个键的失败次数
    failures: Mutex<HashMap<K, u32>>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// 创建新的限速器
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// 记录一次失败并返回本次的延迟：`base * 2^失败次数`，不超过上限
    pub async fn when(&self, key: &K) -> Duration {
        let mut failures = self.failures.lock().await;
        let count = failures.entry(key.clone()).or_insert(0);
        let exponent = (*count).min(31);
        *count = count.saturating_add(1);

        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// 清除键的失败记录
    pub async fn forget(&self, key: &K) {
        self.failures.lock().await.remove(key);
    }

    /// 键的失败次数
    pub async fn num_requeues(&self, key: &K) -> u32 {
        self.failures.lock().await.get(key).copied().unwrap_or(0)
    }
}
