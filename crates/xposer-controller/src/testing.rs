//! 测试夹具：Service 构造函数与内存中的集群实现

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use xposer_common::{ApiError, ObjectKey};

use crate::cluster::{ClusterApi, ClusterFlavor, ExposureEvent, WatchEvent, WatchStream};
use crate::config::ControllerConfig;
use crate::exposure::{Exposure, ExposureKind};

/// 测试用配置：暴露注解键为 `expose`
pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        expose_annotation_key: "expose".to_string(),
        host_template: "{name}.{namespace}.example.com".to_string(),
        ..Default::default()
    }
}

/// 带两个端口（http:80、https:8443）的 Service
pub fn service(namespace: &str, name: &str, annotations: BTreeMap<String, String>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{name}")),
            resource_version: Some("1".to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![
                ServicePort {
                    name: Some("http".to_string()),
                    port: 80,
                    target_port: Some(IntOrString::Int(8080)),
                    ..Default::default()
                },
                ServicePort {
                    name: Some("https".to_string()),
                    port: 8443,
                    target_port: Some(IntOrString::Int(8443)),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// 带 `expose=true` 注解的 Service
pub fn exposed_service(namespace: &str, name: &str) -> Service {
    service(
        namespace,
        name,
        BTreeMap::from([("expose".to_string(), "true".to_string())]),
    )
}

/// 可注入失败的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct FakeState {
    services: HashMap<ObjectKey, Service>,
    exposures: HashMap<ObjectKey, Exposure>,
    failures: HashMap<Op, VecDeque<ApiError>>,
    calls: HashMap<Op, usize>,
    events: Vec<ExposureEvent>,
    next_version: u64,
}

impl FakeState {
    fn bump(&mut self, exposure: &mut Exposure) {
        self.next_version += 1;
        exposure.metadata_mut().resource_version = Some(self.next_version.to_string());
    }

    fn record(&mut self, op: Op) -> Result<(), ApiError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// 内存中的集群
///
/// 写操作会递增资源版本；更新时校验资源版本，不一致返回冲突。
pub struct FakeCluster {
    flavor: ClusterFlavor,
    state: Mutex<FakeState>,
}

impl FakeCluster {
    pub fn new(flavor: ClusterFlavor) -> Self {
        Self {
            flavor,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn kind(&self) -> ExposureKind {
        ExposureKind::for_flavor(self.flavor)
    }

    pub fn insert_service(&self, service: Service) {
        let key = ObjectKey::from_resource(&service).unwrap();
        self.state.lock().unwrap().services.insert(key, service);
    }

    pub fn remove_service(&self, key: &ObjectKey) {
        self.state.lock().unwrap().services.remove(key);
    }

    /// 写入暴露资源（模拟带外修改），返回带新资源版本的对象
    pub fn put_exposure(&self, mut exposure: Exposure) -> Exposure {
        let key = exposure.key().unwrap();
        let mut state = self.state.lock().unwrap();
        state.bump(&mut exposure);
        state.exposures.insert(key, exposure.clone());
        exposure
    }

    /// 写入一个 Service 已不存在的受管暴露资源
    pub fn insert_orphan_exposure(&self, namespace: &str, name: &str) -> Exposure {
        let exposure = self
            .kind()
            .build(&exposed_service(namespace, name), &test_config())
            .unwrap();
        self.put_exposure(exposure)
    }

    pub fn exposure(&self, key: &ObjectKey) -> Option<Exposure> {
        self.state.lock().unwrap().exposures.get(key).cloned()
    }

    pub fn exposure_count(&self) -> usize {
        self.state.lock().unwrap().exposures.len()
    }

    /// 让某个操作接下来依次返回给定错误
    pub fn fail(&self, op: Op, errors: impl IntoIterator<Item = ApiError>) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(op)
            .or_default()
            .extend(errors);
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    /// 全部写操作次数
    pub fn writes(&self) -> usize {
        self.calls(Op::Create) + self.calls(Op::Update) + self.calls(Op::Delete)
    }

    pub fn events(&self) -> Vec<ExposureEvent> {
        self.state.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    fn flavor(&self) -> ClusterFlavor {
        self.flavor
    }

    async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        Ok(self.state.lock().unwrap().services.values().cloned().collect())
    }

    fn watch_services(&self) -> WatchStream<Service> {
        let services = self.state.lock().unwrap().services.values().cloned().collect();
        stream::once(async move { Ok(WatchEvent::Restarted(services)) })
            .chain(stream::pending())
            .boxed()
    }

    async fn list_exposures(&self) -> Result<Vec<Exposure>, ApiError> {
        Ok(self.state.lock().unwrap().exposures.values().cloned().collect())
    }

    fn watch_exposures(&self) -> WatchStream<Exposure> {
        let exposures = self.state.lock().unwrap().exposures.values().cloned().collect();
        stream::once(async move { Ok(WatchEvent::Restarted(exposures)) })
            .chain(stream::pending())
            .boxed()
    }

    async fn get_exposure(&self, key: &ObjectKey) -> Result<Option<Exposure>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Get)?;
        Ok(state.exposures.get(key).cloned())
    }

    async fn create_exposure(&self, exposure: &Exposure) -> Result<Exposure, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Create)?;
        let key = exposure.key().ok_or_else(|| ApiError::Request("缺少名称".into()))?;
        if state.exposures.contains_key(&key) {
            return Err(ApiError::AlreadyExists(key.to_string()));
        }
        let mut created = exposure.clone();
        state.bump(&mut created);
        state.exposures.insert(key, created.clone());
        Ok(created)
    }

    async fn update_exposure(&self, exposure: &Exposure) -> Result<Exposure, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Update)?;
        let key = exposure.key().ok_or_else(|| ApiError::Request("缺少名称".into()))?;
        let current = state
            .exposures
            .get(&key)
            .ok_or_else(|| ApiError::NotFound(key.to_string()))?;
        if current.resource_version() != exposure.resource_version() {
            return Err(ApiError::Conflict(key.to_string()));
        }
        let mut updated = exposure.clone();
        state.bump(&mut updated);
        state.exposures.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete_exposure(&self, key: &ObjectKey) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Delete)?;
        state
            .exposures
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(key.to_string()))
    }

    async fn publish_event(&self, _service: &Service, event: ExposureEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}
