//! 集群访问接口
//!
//! 协调引擎只依赖 [`ClusterApi`] 描述的能力集合，不依赖具体的客户端类型。
//! 命名空间范围在实现构造时确定。

use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Service;
use std::fmt;
use xposer_common::{ApiError, ObjectKey};

use crate::exposure::Exposure;

/// 集群类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterFlavor {
    /// 原生 Kubernetes，使用 Ingress 暴露
    Kubernetes,
    /// OpenShift，使用 Route 暴露
    OpenShift,
}

impl fmt::Display for ClusterFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterFlavor::Kubernetes => write!(f, "kubernetes"),
            ClusterFlavor::OpenShift => write!(f, "openshift"),
        }
    }
}

/// 监听事件
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    /// 资源被添加或修改
    Applied(K),
    /// 资源被删除
    Deleted(K),
    /// 监听（重新）列举，包含当前全部对象
    Restarted(Vec<K>),
}

/// 监听事件流
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, ApiError>>;

/// 事件级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    /// 正常
    Normal,
    /// 警告
    Warning,
}

/// 发布到 Service 上的 Kubernetes 事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureEvent {
    /// 事件级别
    pub severity: EventSeverity,
    /// 机器可读的原因
    pub reason: &'static str,
    /// 人类可读的说明
    pub message: String,
}

impl ExposureEvent {
    /// 正常事件
    pub fn normal(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Normal,
            reason,
            message: message.into(),
        }
    }

    /// 警告事件
    pub fn warning(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Warning,
            reason,
            message: message.into(),
        }
    }
}

/// 事件原因
pub mod reasons {
    /// 已创建暴露资源
    pub const CREATED: &str = "ExposureCreated";
    /// 已更新暴露资源
    pub const UPDATED: &str = "ExposureUpdated";
    /// 已删除暴露资源
    pub const DELETED: &str = "ExposureDeleted";
    /// 暴露策略无效
    pub const INVALID_POLICY: &str = "InvalidExposurePolicy";
}

/// 集群访问能力集合
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// 当前集群类型
    fn flavor(&self) -> ClusterFlavor;

    /// 列举范围内的全部 Service
    async fn list_services(&self) -> Result<Vec<Service>, ApiError>;

    /// 监听范围内的 Service
    fn watch_services(&self) -> WatchStream<Service>;

    /// 列举范围内由 Xposer 管理的暴露资源
    async fn list_exposures(&self) -> Result<Vec<Exposure>, ApiError>;

    /// 监听范围内由 Xposer 管理的暴露资源
    fn watch_exposures(&self) -> WatchStream<Exposure>;

    /// 读取暴露资源，不存在时返回 `None`
    async fn get_exposure(&self, key: &ObjectKey) -> Result<Option<Exposure>, ApiError>;

    /// 创建暴露资源
    async fn create_exposure(&self, exposure: &Exposure) -> Result<Exposure, ApiError>;

    /// 替换暴露资源，请求体携带资源版本
    async fn update_exposure(&self, exposure: &Exposure) -> Result<Exposure, ApiError>;

    /// 删除暴露资源
    async fn delete_exposure(&self, key: &ObjectKey) -> Result<(), ApiError>;

    /// 在 Service 上发布事件，失败只记录日志
    async fn publish_event(&self, service: &Service, event: ExposureEvent);
}
