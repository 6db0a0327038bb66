//! 事件源模块
//!
//! 监听 Service 与由 Xposer 管理的暴露资源，把通知写入本地缓存并把受影响的键
//! 交给工作队列。监听出错时的退避由 [`ClusterApi`] 的监听流负责，流结束后在
//! 固定延迟后重新建立；另有周期性全量重新同步兜底。

use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xposer_common::{ApiError, ObjectKey};

use crate::cache::{Cacheable, Store};
use crate::cluster::{ClusterApi, WatchEvent, WatchStream};
use crate::exposure::Exposure;
use crate::queue::WorkQueue;

/// 监听流结束后重新建立前的等待时间
const WATCH_RESTART_DELAY: Duration = Duration::from_secs(1);

/// 事件源
pub struct EventSource<C: ?Sized> {
    /// 集群访问接口
    cluster: Arc<C>,
    /// Service 缓存
    services: Store<Service>,
    /// 暴露资源缓存
    exposures: Store<Exposure>,
    /// 工作队列
    queue: WorkQueue<ObjectKey>,
    /// 全量重新同步间隔
    resync_interval: Duration,
}

impl<C> EventSource<C>
where
    C: ClusterApi + ?Sized + 'static,
{
    /// 创建新的事件源
    pub fn new(
        cluster: Arc<C>,
        services: Store<Service>,
        exposures: Store<Exposure>,
        queue: WorkQueue<ObjectKey>,
        resync_interval: Duration,
    ) -> Self {
        Self {
            cluster,
            services,
            exposures,
            queue,
            resync_interval,
        }
    }

    /// 运行监听与重新同步循环，直到收到停止信号
    pub async fn run(&self, stop: CancellationToken) {
        info!("启动事件源，重新同步间隔: {:?}", self.resync_interval);

        let exposure_kind = match self.cluster.flavor() {
            crate::cluster::ClusterFlavor::Kubernetes => "Ingress",
            crate::cluster::ClusterFlavor::OpenShift => "Route",
        };

        tokio::join!(
            self.watch("Service", &self.services, || self.cluster.watch_services(), &stop),
            self.watch(exposure_kind, &self.exposures, || self.cluster.watch_exposures(), &stop),
            self.resync_loop(&stop),
        );

        info!("事件源已停止");
    }

    /// 维持一个资源类型的监听，流结束后重新建立
    async fn watch<K, F>(&self, resource: &str, store: &Store<K>, connect: F, stop: &CancellationToken)
    where
        K: Cacheable,
        F: Fn() -> WatchStream<K>,
    {
        loop {
            info!("开始监听 {}", resource);
            let mut stream = connect();

            loop {
                let next = tokio::select! {
                    _ = stop.cancelled() => return,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(event)) => self.apply(store, event).await,
                    // 监听流自身会退避后重试
                    Some(Err(e)) => warn!("{} 监听出错: {}", resource, e),
                    None => break,
                }
            }

            warn!("{} 监听流已结束，{:?} 后重新连接", resource, WATCH_RESTART_DELAY);
            if !sleep_or_stop(WATCH_RESTART_DELAY, stop).await {
                return;
            }
        }
    }

    /// 把一条监听事件写入缓存并入队受影响的键
    pub async fn apply<K: Cacheable>(&self, store: &Store<K>, event: WatchEvent<K>) {
        match event {
            WatchEvent::Applied(obj) => {
                let Some(key) = obj.cache_key() else { return };
                if store.set(key.clone(), obj).await {
                    self.queue.add(key).await;
                }
            }
            WatchEvent::Deleted(obj) => {
                let Some(key) = obj.cache_key() else { return };
                store.delete(&key).await;
                self.queue.add(key).await;
            }
            WatchEvent::Restarted(objs) => {
                let keys = store.replace(objs).await;
                debug!("重新列举完成，入队 {} 个键", keys.len());
                for key in keys {
                    self.queue.add(key).await;
                }
            }
        }
    }

    async fn resync_loop(&self, stop: &CancellationToken) {
        let mut ticker = tokio::time::interval(self.resync_interval);
        // 首次触发立即返回，启动时的列举由监听完成
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = self.resync().await {
                        warn!("全量重新同步失败: {}", e);
                    }
                }
            }
        }
    }

    /// 全量重新同步：重新列举、刷新缓存并入队缓存中的全部键
    ///
    /// 列举结果可能比监听流旧，只用于前移已缓存对象的版本，不会淘汰缓存条目。
    pub async fn resync(&self) -> Result<usize, ApiError> {
        let services = self.cluster.list_services().await?;
        let exposures = self.cluster.list_exposures().await?;

        let mut keys: HashSet<ObjectKey> = self.services.refresh(services).await.into_iter().collect();
        keys.extend(self.exposures.refresh(exposures).await);

        for key in &keys {
            self.queue.add(key.clone()).await;
        }

        info!("全量重新同步完成，入队 {} 个键", keys.len());
        Ok(keys.len())
    }
}

/// 等待一段时间，收到停止信号时返回 `false`
async fn sleep_or_stop(delay: Duration, stop: &CancellationToken) -> bool {
    tokio::select! {
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
