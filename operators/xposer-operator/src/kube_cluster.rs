//! 基于 kube-rs 的集群访问实现
//!
//! 把 kube 客户端的列举、监听、读写与事件发布适配为 [`ClusterApi`]，
//! 并把客户端错误归类为 [`ApiError`]。

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{Api, DeleteParams, ListParams, PostParams},
    client::Client,
    runtime::events::{Event, EventType, Recorder, Reporter},
    runtime::{watcher, WatchStreamExt},
    Resource,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, warn};
use xposer_common::{managed_selector, ApiError, ObjectKey, Route};
use xposer_controller::{
    ClusterApi, ClusterFlavor, EventSeverity, Exposure, ExposureEvent, WatchEvent, WatchStream,
};

/// 事件上报者名称
const REPORTER: &str = "xposer";

/// kube-rs 集群访问实现
pub struct KubeCluster {
    /// Kubernetes 客户端
    client: Client,
    /// 集群类型
    flavor: ClusterFlavor,
    /// 监听的命名空间，`None` 表示全部
    namespace: Option<String>,
}

impl KubeCluster {
    /// 创建新的集群访问实现
    ///
    /// `namespace` 为空字符串时监听所有命名空间。
    pub fn new(client: Client, flavor: ClusterFlavor, namespace: &str) -> Self {
        Self {
            client,
            flavor,
            namespace: Some(namespace.to_string()).filter(|ns| !ns.is_empty()),
        }
    }

    /// 按命名空间范围构造 API
    fn scoped<K>(&self) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn managed() -> ListParams {
        ListParams::default().labels(&managed_selector())
    }
}

/// 把 kube 客户端错误归类
pub fn classify(err: kube::Error) -> ApiError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => ApiError::NotFound(resp.message.clone()),
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            ApiError::AlreadyExists(resp.message.clone())
        }
        kube::Error::Api(resp) if resp.code == 409 => ApiError::Conflict(resp.message.clone()),
        _ => ApiError::Request(err.to_string()),
    }
}

/// 把 kube 监听流转换为控制器的监听流
///
/// 重连退避由调用方通过 `default_backoff()` 加在 kube 监听流上。
fn watch_stream<K, T, S>(stream: S, wrap: fn(K) -> T) -> WatchStream<T>
where
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
    K: Send + 'static,
    T: Send + 'static,
{
    stream
        .map(move |result| match result {
            Ok(watcher::Event::Applied(obj)) => Ok(WatchEvent::Applied(wrap(obj))),
            Ok(watcher::Event::Deleted(obj)) => Ok(WatchEvent::Deleted(wrap(obj))),
            Ok(watcher::Event::Restarted(objs)) => {
                Ok(WatchEvent::Restarted(objs.into_iter().map(wrap).collect()))
            }
            Err(e) => Err(ApiError::Watch(e.to_string())),
        })
        .boxed()
}

fn object_key(exposure: &Exposure) -> Result<ObjectKey, ApiError> {
    exposure
        .key()
        .ok_or_else(|| ApiError::Request(format!("{} 缺少名称或命名空间", exposure.kind())))
}

async fn list_all<K>(api: Api<K>, params: &ListParams) -> Result<Vec<K>, ApiError>
where
    K: Clone + DeserializeOwned + Debug,
{
    Ok(api.list(params).await.map_err(classify)?.items)
}

#[async_trait]
impl ClusterApi for KubeCluster {
    fn flavor(&self) -> ClusterFlavor {
        self.flavor
    }

    async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        list_all(self.scoped::<Service>(), &ListParams::default()).await
    }

    fn watch_services(&self) -> WatchStream<Service> {
        watch_stream(
            watcher(self.scoped::<Service>(), watcher::Config::default()).default_backoff(),
            std::convert::identity,
        )
    }

    async fn list_exposures(&self) -> Result<Vec<Exposure>, ApiError> {
        let params = Self::managed();
        let exposures: Vec<Exposure> = match self.flavor {
            ClusterFlavor::Kubernetes => list_all(self.scoped::<Ingress>(), &params)
                .await?
                .into_iter()
                .map(Exposure::Ingress)
                .collect(),
            ClusterFlavor::OpenShift => list_all(self.scoped::<Route>(), &params)
                .await?
                .into_iter()
                .map(Exposure::Route)
                .collect(),
        };
        Ok(exposures)
    }

    fn watch_exposures(&self) -> WatchStream<Exposure> {
        let config = watcher::Config::default().labels(&managed_selector());
        match self.flavor {
            ClusterFlavor::Kubernetes => {
                let stream = watcher(self.scoped::<Ingress>(), config).default_backoff();
                watch_stream(stream, Exposure::Ingress)
            }
            ClusterFlavor::OpenShift => {
                let stream = watcher(self.scoped::<Route>(), config).default_backoff();
                watch_stream(stream, Exposure::Route)
            }
        }
    }

    async fn get_exposure(&self, key: &ObjectKey) -> Result<Option<Exposure>, ApiError> {
        let exposure = match self.flavor {
            ClusterFlavor::Kubernetes => self
                .namespaced::<Ingress>(&key.namespace)
                .get_opt(&key.name)
                .await
                .map_err(classify)?
                .map(Exposure::Ingress),
            ClusterFlavor::OpenShift => self
                .namespaced::<Route>(&key.namespace)
                .get_opt(&key.name)
                .await
                .map_err(classify)?
                .map(Exposure::Route),
        };
        Ok(exposure)
    }

    async fn create_exposure(&self, exposure: &Exposure) -> Result<Exposure, ApiError> {
        let key = object_key(exposure)?;
        let params = PostParams::default();
        let result = match exposure {
            Exposure::Ingress(ingress) => self
                .namespaced::<Ingress>(&key.namespace)
                .create(&params, ingress)
                .await
                .map(Exposure::Ingress),
            Exposure::Route(route) => self
                .namespaced::<Route>(&key.namespace)
                .create(&params, route)
                .await
                .map(Exposure::Route),
        };
        result.map_err(classify)
    }

    async fn update_exposure(&self, exposure: &Exposure) -> Result<Exposure, ApiError> {
        let key = object_key(exposure)?;
        let params = PostParams::default();
        let result = match exposure {
            Exposure::Ingress(ingress) => self
                .namespaced::<Ingress>(&key.namespace)
                .replace(&key.name, &params, ingress)
                .await
                .map(Exposure::Ingress),
            Exposure::Route(route) => self
                .namespaced::<Route>(&key.namespace)
                .replace(&key.name, &params, route)
                .await
                .map(Exposure::Route),
        };
        result.map_err(classify)
    }

    async fn delete_exposure(&self, key: &ObjectKey) -> Result<(), ApiError> {
        let params = DeleteParams::default();
        let result = match self.flavor {
            ClusterFlavor::Kubernetes => self
                .namespaced::<Ingress>(&key.namespace)
                .delete(&key.name, &params)
                .await
                .map(|_| ()),
            ClusterFlavor::OpenShift => self
                .namespaced::<Route>(&key.namespace)
                .delete(&key.name, &params)
                .await
                .map(|_| ()),
        };
        result.map_err(classify)
    }

    async fn publish_event(&self, service: &Service, event: ExposureEvent) {
        let reporter = Reporter {
            controller: REPORTER.to_string(),
            instance: None,
        };
        let recorder = Recorder::new(self.client.clone(), reporter, service.object_ref(&()));
        let type_ = match event.severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };

        debug!("发布事件 {}: {}", event.reason, event.message);
        let result = recorder
            .publish(Event {
                type_,
                reason: event.reason.to_string(),
                note: Some(event.message),
                action: "Reconcile".to_string(),
                secondary: None,
            })
            .await;
        if let Err(e) = result {
            warn!("发布事件 {} 失败: {}", event.reason, e);
        }
    }
}
