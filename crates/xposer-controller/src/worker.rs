//! 工作者
//!
//! 固定数量的工作者从队列取键、调用协调器，并按错误分类决定是否以及如何重新入队。

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use xposer_common::{ObjectKey, Result, RetryStrategy};

use crate::cluster::ClusterApi;
use crate::queue::WorkQueue;
use crate::reconcile::{Outcome, Reconciler};

/// 写冲突后重新入队前的固定延迟
const CONFLICT_REQUEUE_DELAY: Duration = Duration::from_millis(200);

/// 处理队列中的下一个键；队列关闭后返回 `false`
pub async fn process_next_item<C>(
    queue: &WorkQueue<ObjectKey>,
    reconciler: &Reconciler<C>,
    max_retries: u32,
) -> bool
where
    C: ClusterApi + ?Sized,
{
    let Some(key) = queue.get().await else {
        return false;
    };

    let result = reconciler.reconcile(&key).await;
    handle_result(queue, &key, result, max_retries).await;
    queue.done(&key).await;
    true
}

async fn handle_result(
    queue: &WorkQueue<ObjectKey>,
    key: &ObjectKey,
    result: Result<Outcome>,
    max_retries: u32,
) {
    let err = match result {
        Ok(outcome) => {
            debug!("{} 协调完成: {}", key, outcome);
            queue.forget(key).await;
            return;
        }
        Err(err) => err,
    };

    match err.retry_strategy() {
        RetryStrategy::Requeue => {
            debug!("{} 发生冲突，{:?} 后重试: {}", key, CONFLICT_REQUEUE_DELAY, err);
            queue.add_after(key.clone(), CONFLICT_REQUEUE_DELAY);
        }
        RetryStrategy::None => {
            debug!("{} 无需重试: {}", key, err);
            queue.forget(key).await;
        }
        RetryStrategy::Backoff => {
            let retries = queue.num_requeues(key).await;
            if retries < max_retries {
                if !err.is_policy() {
                    warn!("{} 协调失败（第 {} 次）: {}", key, retries + 1, err);
                }
                queue.add_rate_limited(key.clone()).await;
            } else {
                error!("{} 超过最大重试次数 {}，放弃: {}", key, max_retries, err);
                queue.forget(key).await;
            }
        }
    }
}

/// 工作者循环，直到队列关闭
pub async fn run_worker<C>(
    id: usize,
    queue: WorkQueue<ObjectKey>,
    reconciler: Arc<Reconciler<C>>,
    max_retries: u32,
) where
    C: ClusterApi + ?Sized,
{
    debug!("工作者 {} 已启动", id);
    while process_next_item(&queue, &reconciler, max_retries).await {}
    info!("工作者 {} 已退出", id);
}
