//! 协调键模型
//!
//! 协调键由 (namespace, name) 组成，用于在缓存和工作队列中标识一个 Service，
//! 以及与其同名的暴露资源。

use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 协调键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// 命名空间
    pub namespace: String,
    /// 资源名称
    pub name: String,
}

impl ObjectKey {
    /// 创建新的协调键
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// 从 Kubernetes 资源元数据中提取协调键
    ///
    /// 集群级资源或缺少名称的对象返回 `None`。
    pub fn from_resource<K: Resource>(obj: &K) -> Option<Self> {
        let namespace = obj.namespace()?;
        let name = obj.meta().name.clone()?;
        Some(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_key_display() {
        assert_eq!(ObjectKey::new("ns", "foo").to_string(), "ns/foo");
    }

    #[test]
    fn test_key_from_resource() {
        let svc = Service {
            metadata: ObjectMeta {
                name: Some("foo".into()),
                namespace: Some("ns".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(ObjectKey::from_resource(&svc), Some(ObjectKey::new("ns", "foo")));

        let unnamed = Service::default();
        assert_eq!(ObjectKey::from_resource(&unnamed), None);
    }
}
