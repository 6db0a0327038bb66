//! 控制器模块
//!
//! 组装事件源、缓存、工作队列与工作者，并管理它们的生命周期。

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use xposer_common::Result;

use crate::cache::Store;
use crate::cluster::ClusterApi;
use crate::config::ControllerConfig;
use crate::exposure::ExposureKind;
use crate::queue::{RateLimiter, WorkQueue};
use crate::reconcile::Reconciler;
use crate::source::EventSource;
use crate::worker::run_worker;

/// 控制器
pub struct Controller<C: ?Sized> {
    /// 集群访问接口
    cluster: Arc<C>,
    /// 控制器配置
    config: Arc<ControllerConfig>,
}

impl<C> Controller<C>
where
    C: ClusterApi + ?Sized + 'static,
{
    /// 创建新的控制器
    pub fn new(cluster: Arc<C>, config: ControllerConfig) -> Self {
        Self {
            cluster,
            config: Arc::new(config),
        }
    }

    /// 运行控制器直到收到停止信号
    ///
    /// 配置无效时立即返回错误。两个缓存都完成首次列举后才启动工作者；
    /// 停止时关闭队列，等待工作者处理完当前键后返回。
    pub async fn start(&self, stop: CancellationToken) -> Result<()> {
        self.config.validate()?;

        let flavor = self.cluster.flavor();
        let kind = ExposureKind::for_flavor(flavor);
        info!(
            "启动 Xposer 控制器: 集群类型 {}，暴露资源 {}，命名空间 {}",
            flavor,
            kind.name(),
            if self.config.watches_all_namespaces() {
                "<全部>"
            } else {
                self.config.namespace_scope.as_str()
            }
        );

        let services = Store::new();
        let exposures = Store::new();
        let queue = WorkQueue::new(RateLimiter::new(
            self.config.retry_base_delay(),
            self.config.retry_max_delay(),
        ));

        let source = Arc::new(EventSource::new(
            self.cluster.clone(),
            services.clone(),
            exposures.clone(),
            queue.clone(),
            self.config.resync_interval(),
        ));
        let source_handle = {
            let source = source.clone();
            let stop = stop.clone();
            tokio::spawn(async move { source.run(stop).await })
        };

        let synced = tokio::select! {
            _ = stop.cancelled() => false,
            _ = async { tokio::join!(services.wait_synced(), exposures.wait_synced()) } => true,
        };

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        if synced {
            info!("缓存同步完成，启动 {} 个工作者", self.config.worker_count);
            let reconciler = Arc::new(Reconciler::new(
                self.cluster.clone(),
                kind,
                self.config.clone(),
                services,
                exposures,
            ));
            for id in 0..self.config.worker_count {
                workers.push(tokio::spawn(run_worker(
                    id,
                    queue.clone(),
                    reconciler.clone(),
                    self.config.max_retries,
                )));
            }
        }

        stop.cancelled().await;
        info!("收到停止信号，正在关闭控制器");

        queue.shut_down().await;
        for worker in workers {
            if let Err(e) = worker.await {
                error!("工作者异常退出: {}", e);
            }
        }
        if let Err(e) = source_handle.await {
            error!("事件源异常退出: {}", e);
        }

        info!("Xposer 控制器已停止");
        Ok(())
    }
}
