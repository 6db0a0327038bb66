//! Xposer Operator - 自动为 Service 生成对外访问入口
//!
//! 该模块负责引导：创建 Kubernetes 客户端、探测集群类型、构造基于 kube-rs 的
//! 集群访问实现，然后把控制权交给 `xposer-controller` 的协调引擎。

pub mod flavor;
pub mod kube_cluster;
pub mod settings;

use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xposer_controller::{Controller, ControllerConfig};

use crate::kube_cluster::KubeCluster;

/// Operator 主结构体
pub struct XposerOperator {
    /// 控制器
    controller: Controller<KubeCluster>,
    /// 停止信号
    stop: CancellationToken,
}

impl XposerOperator {
    /// 创建新的 Operator 实例
    ///
    /// 凭据无效或无法探测集群类型时返回错误。
    pub async fn new(config: ControllerConfig) -> Result<Self> {
        config.validate().context("配置无效")?;

        // 创建 Kubernetes 客户端
        let client = Client::try_default()
            .await
            .context("创建 Kubernetes 客户端失败")?;

        let flavor = flavor::detect_flavor(&client).await?;
        let cluster = Arc::new(KubeCluster::new(client, flavor, &config.namespace_scope));

        Ok(Self {
            controller: Controller::new(cluster, config),
            stop: CancellationToken::new(),
        })
    }

    /// 启动 Operator，直到 [`XposerOperator::stop`] 被调用
    pub async fn start(&self) -> Result<()> {
        info!("启动 Xposer Operator");
        self.controller
            .start(self.stop.clone())
            .await
            .context("控制器运行失败")?;
        Ok(())
    }

    /// 停止 Operator
    pub fn stop(&self) {
        info!("停止 Xposer Operator");
        self.stop.cancel();
    }

    /// 停止信号，可交给信号处理任务
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }
}
