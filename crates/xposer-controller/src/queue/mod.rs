//! 工作队列模块
//!
//! 去重、限速的协调键队列，把事件到达与处理解耦：
//! - 同一个键在队列中最多只有一份；
//! - 正在处理的键不会被其他工作者取走，处理期间再次加入的键在 `done` 后重新投递；
//! - 失败的键按指数退避重新入队。

mod rate_limiter;

pub use rate_limiter::RateLimiter;

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// 队列内部状态
struct QueueState<K> {
    /// 等待处理的键，按入队顺序
    queue: VecDeque<K>,
    /// 需要处理的键（等待中或处理期间被再次加入）
    dirty: HashSet<K>,
    /// 正在处理的键
    processing: HashSet<K>,
    /// 是否正在关闭
    shutting_down: bool,
}

struct Inner<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
    limiter: RateLimiter<K>,
}

/// 工作队列
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> WorkQueue<K>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Display + 'static,
{
    /// 创建新的工作队列
    pub fn new(limiter: RateLimiter<K>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                limiter,
            }),
        }
    }

    /// 加入键；已在等待中的键被合并，正在处理的键在处理完成后重新投递
    pub async fn add(&self, key: K) {
        let mut state = self.inner.state.lock().await;
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            debug!("键 {} 正在处理，完成后重新投递", key);
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// 等待并取出一个键，标记为处理中；队列关闭后返回 `None`
    pub async fn get(&self) -> Option<K> {
        loop {
            // 先注册通知再检查状态，避免错过唤醒
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// 标记键处理完成
    pub async fn done(&self, key: &K) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// 延迟加入键
    pub fn add_after(&self, key: K, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            queue.add(key).await;
        });
    }

    /// 按退避延迟重新加入键
    pub async fn add_rate_limited(&self, key: K) {
        let delay = self.inner.limiter.when(&key).await;
        debug!("键 {} 将在 {:?} 后重试", key, delay);
        self.add_after(key, delay);
    }

    /// 清除键的退避状态
    pub async fn forget(&self, key: &K) {
        self.inner.limiter.forget(key).await;
    }

    /// 键自上次清除以来的失败次数
    pub async fn num_requeues(&self, key: &K) -> u32 {
        self.inner.limiter.num_requeues(key).await
    }

    /// 等待处理的键数量
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    /// 是否没有等待处理的键
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 关闭队列并唤醒所有等待的工作者
    pub async fn shut_down(&self) {
        self.inner.state.lock().await.shutting_down = true;
        self.inner.notify.notify_waiters();
    }
}
