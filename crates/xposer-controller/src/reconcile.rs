//! 资源协调模块
//!
//! 对单个协调键执行一次收敛：读取缓存中的 Service，计算期望的暴露资源，
//! 与缓存中的现有资源比较后执行创建、更新或删除。重复执行结果相同。

use k8s_openapi::api::core::v1::Service;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use xposer_common::{ApiError, Error, ObjectKey, PolicyError, Result};

use crate::cache::Store;
use crate::cluster::{reasons, ClusterApi, ExposureEvent};
use crate::config::ControllerConfig;
use crate::exposure::{exposure_enabled, Exposure, ExposureKind};

/// 协调结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 创建了暴露资源
    Created,
    /// 更新了暴露资源
    Updated,
    /// 删除了暴露资源
    Deleted,
    /// 已收敛，无需写入
    Unchanged,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Deleted => write!(f, "deleted"),
            Outcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// 协调器
pub struct Reconciler<C: ?Sized> {
    /// 集群访问接口
    cluster: Arc<C>,
    /// 启动时选定的暴露资源类型
    kind: ExposureKind,
    /// 控制器配置
    config: Arc<ControllerConfig>,
    /// Service 缓存
    services: Store<Service>,
    /// 暴露资源缓存
    exposures: Store<Exposure>,
}

impl<C> Reconciler<C>
where
    C: ClusterApi + ?Sized,
{
    /// 创建新的协调器
    pub fn new(
        cluster: Arc<C>,
        kind: ExposureKind,
        config: Arc<ControllerConfig>,
        services: Store<Service>,
        exposures: Store<Exposure>,
    ) -> Self {
        Self {
            cluster,
            kind,
            config,
            services,
            exposures,
        }
    }

    /// 协调一个键
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome> {
        debug!("协调 {}", key);

        let Some(service) = self.services.get(key).await else {
            return self.cleanup(key, None).await;
        };

        let enabled = match exposure_enabled(&service, &self.config) {
            Ok(enabled) => enabled,
            Err(e) => return Err(self.policy_failure(&service, key, e).await),
        };
        if !enabled {
            return self.cleanup(key, Some(service.as_ref())).await;
        }

        let desired = match self.kind.build(&service, &self.config) {
            Ok(desired) => desired,
            Err(e) => return Err(self.policy_failure(&service, key, e).await),
        };

        match self.exposures.get(key).await {
            None => self.create(key, &service, desired).await,
            Some(existing) => self.update(key, &service, &existing, desired).await,
        }
    }

    /// 删除不再需要的暴露资源
    ///
    /// 暴露资源缓存只含受管对象，缓存命中即可删除。
    async fn cleanup(&self, key: &ObjectKey, service: Option<&Service>) -> Result<Outcome> {
        if self.exposures.get(key).await.is_none() {
            return Ok(Outcome::Unchanged);
        }

        match self.cluster.delete_exposure(key).await {
            Ok(()) => {
                self.exposures.delete(key).await;
                info!("已删除 {} {}", self.kind.name(), key);
                if let Some(service) = service {
                    self.cluster
                        .publish_event(
                            service,
                            ExposureEvent::normal(
                                reasons::DELETED,
                                format!("已删除 {} {}", self.kind.name(), key),
                            ),
                        )
                        .await;
                }
                Ok(Outcome::Deleted)
            }
            Err(ApiError::NotFound(_)) => {
                debug!("{} {} 已不存在", self.kind.name(), key);
                self.exposures.delete(key).await;
                Ok(Outcome::Unchanged)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 创建暴露资源；缓存过期导致的已存在错误按实时对象处理
    async fn create(&self, key: &ObjectKey, service: &Service, desired: Exposure) -> Result<Outcome> {
        match self.cluster.create_exposure(&desired).await {
            Ok(created) => Ok(self.written(key, service, created, Outcome::Created).await),
            Err(ApiError::AlreadyExists(_)) => {
                debug!("{} {} 已存在，读取实时对象", self.kind.name(), key);
                match self.cluster.get_exposure(key).await? {
                    Some(live) if live.is_managed() => self.update(key, service, &live, desired).await,
                    Some(_) => {
                        let err = PolicyError::ForeignObject(format!("{} {}", self.kind.name(), key));
                        Err(self.policy_failure(service, key, err).await)
                    }
                    // 创建与读取之间被删除，重新排队即可
                    None => Err(ApiError::Conflict(key.to_string()).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 比较现有资源，不一致时写回期望状态
    async fn update(
        &self,
        key: &ObjectKey,
        service: &Service,
        existing: &Exposure,
        desired: Exposure,
    ) -> Result<Outcome> {
        if self.kind.matches(existing, &desired) {
            debug!("{} {} 已是期望状态", self.kind.name(), key);
            self.exposures.set(key.clone(), existing.clone()).await;
            return Ok(Outcome::Unchanged);
        }

        let merged = self.kind.merge(existing, desired.clone());
        match self.cluster.update_exposure(&merged).await {
            Ok(updated) => Ok(self.written(key, service, updated, Outcome::Updated).await),
            Err(ApiError::NotFound(_)) => {
                debug!("{} {} 已被删除，重新创建", self.kind.name(), key);
                self.exposures.delete(key).await;
                let created = self.cluster.create_exposure(&desired).await?;
                Ok(self.written(key, service, created, Outcome::Created).await)
            }
            Err(err @ ApiError::Conflict(_)) => {
                self.refresh_cached(key).await;
                Err(err.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 写冲突后用实时对象替换缓存条目，下一轮基于最新资源版本更新
    ///
    /// 缓存只保存带管理标签的对象。
    async fn refresh_cached(&self, key: &ObjectKey) {
        match self.cluster.get_exposure(key).await {
            Ok(Some(live)) if live.is_managed() => {
                debug!("{} {} 写冲突，已刷新缓存", self.kind.name(), key);
                self.exposures.set(key.clone(), live).await;
            }
            Ok(_) => {
                self.exposures.delete(key).await;
            }
            Err(e) => {
                debug!("{} {} 写冲突后读取失败: {}", self.kind.name(), key, e);
                self.exposures.delete(key).await;
            }
        }
    }

    /// 写入成功：更新缓存并发布事件
    async fn written(&self, key: &ObjectKey, service: &Service, exposure: Exposure, outcome: Outcome) -> Outcome {
        self.exposures.set(key.clone(), exposure).await;

        let (reason, verb) = match outcome {
            Outcome::Created => (reasons::CREATED, "已创建"),
            _ => (reasons::UPDATED, "已更新"),
        };
        let message = format!("{} {} {}", verb, self.kind.name(), key);
        info!("{}", message);
        self.cluster
            .publish_event(service, ExposureEvent::normal(reason, message))
            .await;
        outcome
    }

    /// 记录策略错误并在 Service 上发布警告事件
    async fn policy_failure(&self, service: &Service, key: &ObjectKey, err: PolicyError) -> Error {
        warn!("Service {} 的暴露策略无效: {}", key, err);
        self.cluster
            .publish_event(
                service,
                ExposureEvent::warning(reasons::INVALID_POLICY, err.to_string()),
            )
            .await;
        Error::Policy(err)
    }
}
