//! 暴露资源抽象
//!
//! 一套暴露策略，两种目标资源：Kubernetes 上的 Ingress 与 OpenShift 上的 Route。
//! [`ExposureKind`] 在启动时根据集群类型选定一次，注入协调器后不再变化。

pub mod ingress;
pub mod policy;
pub mod route;

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use xposer_common::{ObjectKey, PolicyError, Route, MANAGED_BY_LABEL, MANAGED_BY_VALUE};

use crate::cluster::ClusterFlavor;
use crate::config::ControllerConfig;

pub use policy::exposure_enabled;

/// 集群中的暴露资源
#[derive(Debug, Clone, PartialEq)]
pub enum Exposure {
    /// networking.k8s.io/v1 Ingress
    Ingress(Ingress),
    /// route.openshift.io/v1 Route
    Route(Route),
}

impl Exposure {
    /// 资源类型名称
    pub fn kind(&self) -> &'static str {
        match self {
            Exposure::Ingress(_) => "Ingress",
            Exposure::Route(_) => "Route",
        }
    }

    /// 元数据
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Exposure::Ingress(ingress) => &ingress.metadata,
            Exposure::Route(route) => &route.metadata,
        }
    }

    /// 可变元数据
    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Exposure::Ingress(ingress) => &mut ingress.metadata,
            Exposure::Route(route) => &mut route.metadata,
        }
    }

    /// 协调键
    pub fn key(&self) -> Option<ObjectKey> {
        match self {
            Exposure::Ingress(ingress) => ObjectKey::from_resource(ingress),
            Exposure::Route(route) => ObjectKey::from_resource(route),
        }
    }

    /// 资源版本
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata().resource_version.as_deref()
    }

    /// 是否带有 Xposer 管理标签
    pub fn is_managed(&self) -> bool {
        self.metadata()
            .labels
            .as_ref()
            .and_then(|labels| labels.get(MANAGED_BY_LABEL))
            .map(|value| value == MANAGED_BY_VALUE)
            .unwrap_or(false)
    }

    /// 控制者 owner reference 的 uid
    pub fn owner_uid(&self) -> Option<&str> {
        self.metadata()
            .owner_references
            .as_ref()?
            .iter()
            .find(|owner| owner.controller == Some(true))
            .map(|owner| owner.uid.as_str())
    }
}

/// 期望的暴露参数，与具体资源类型无关
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureSpec {
    /// 资源标识，与 Service 相同
    pub key: ObjectKey,
    /// 对外主机名
    pub host: String,
    /// 路径
    pub path: String,
    /// TLS 设置，`None` 表示不启用
    pub tls: Option<TlsSettings>,
    /// 后端端口
    pub port: BackendPort,
    /// 指回 Service 的 owner reference
    pub owner: OwnerReference,
    /// Ingress 类名
    pub ingress_class: Option<String>,
}

/// TLS 设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    /// 证书 Secret 名称，仅 Ingress 使用
    pub secret_name: Option<String>,
}

/// 选中的 Service 端口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPort {
    /// 端口名称
    pub name: Option<String>,
    /// 端口号
    pub number: i32,
    /// Pod 上的目标端口
    pub target_port: Option<IntOrString>,
}

impl ExposureSpec {
    /// 生成暴露资源的元数据
    pub fn metadata(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.key.name.clone()),
            namespace: Some(self.key.namespace.clone()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                MANAGED_BY_VALUE.to_string(),
            )])),
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }
}

/// 暴露资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureKind {
    /// 生成 Ingress
    Ingress,
    /// 生成 Route
    Route,
}

impl ExposureKind {
    /// 根据集群类型选择暴露资源类型
    pub fn for_flavor(flavor: ClusterFlavor) -> Self {
        match flavor {
            ClusterFlavor::Kubernetes => ExposureKind::Ingress,
            ClusterFlavor::OpenShift => ExposureKind::Route,
        }
    }

    /// 资源类型名称
    pub fn name(&self) -> &'static str {
        match self {
            ExposureKind::Ingress => "Ingress",
            ExposureKind::Route => "Route",
        }
    }

    /// 根据 Service 与配置确定性地生成期望的暴露资源
    pub fn build(
        &self,
        service: &Service,
        config: &ControllerConfig,
    ) -> Result<Exposure, PolicyError> {
        let spec = policy::desired_spec(service, config)?;
        Ok(self.render(&spec))
    }

    /// 渲染期望参数
    pub fn render(&self, spec: &ExposureSpec) -> Exposure {
        match self {
            ExposureKind::Ingress => Exposure::Ingress(ingress::render(spec)),
            ExposureKind::Route => Exposure::Route(route::render(spec)),
        }
    }

    /// 比较现有资源与期望资源中 Xposer 拥有的字段
    ///
    /// 其他控制器添加的标签、注解以及服务端默认值不参与比较。
    pub fn matches(&self, existing: &Exposure, desired: &Exposure) -> bool {
        if !existing.is_managed() || existing.owner_uid() != desired.owner_uid() {
            return false;
        }
        match (existing, desired) {
            (Exposure::Ingress(current), Exposure::Ingress(wanted)) => {
                ingress::matches(current, wanted)
            }
            (Exposure::Route(current), Exposure::Route(wanted)) => route::matches(current, wanted),
            _ => false,
        }
    }

    /// 生成更新请求体
    ///
    /// 保留现有资源的身份、资源版本、外部标签与注解，以及非控制者 owner reference。
    pub fn merge(&self, existing: &Exposure, desired: Exposure) -> Exposure {
        let mut merged = match (existing, desired) {
            (Exposure::Ingress(current), Exposure::Ingress(wanted)) => {
                Exposure::Ingress(ingress::merge(current, wanted))
            }
            (Exposure::Route(current), Exposure::Route(wanted)) => {
                Exposure::Route(route::merge(current, wanted))
            }
            (_, wanted) => wanted,
        };
        merge_metadata(existing.metadata(), merged.metadata_mut());
        merged
    }
}

fn merge_metadata(current: &ObjectMeta, desired: &mut ObjectMeta) {
    desired.resource_version = current.resource_version.clone();
    desired.uid = current.uid.clone();
    desired.finalizers = current.finalizers.clone();
    desired.annotations = current.annotations.clone();

    let mut labels = current.labels.clone().unwrap_or_default();
    labels.extend(desired.labels.take().unwrap_or_default());
    desired.labels = Some(labels);

    let mut owners: Vec<OwnerReference> = current
        .owner_references
        .iter()
        .flatten()
        .filter(|owner| owner.controller != Some(true))
        .cloned()
        .collect();
    owners.extend(desired.owner_references.take().unwrap_or_default());
    desired.owner_references = Some(owners);
}
