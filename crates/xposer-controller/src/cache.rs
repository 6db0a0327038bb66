//! 本地缓存模块
//!
//! 集群对象的本地镜像，由事件源写入、协调器读取，减少对 API 服务器的请求。
//! 缓存是最终一致的：协调器读到的状态可能稍旧，写冲突由乐观并发处理。

use k8s_openapi::api::core::v1::Service;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::debug;
use xposer_common::ObjectKey;

use crate::exposure::Exposure;

/// 可放入缓存的对象
pub trait Cacheable: Send + Sync + 'static {
    /// 协调键
    fn cache_key(&self) -> Option<ObjectKey>;
    /// 资源版本
    fn version(&self) -> Option<&str>;
}

impl Cacheable for Service {
    fn cache_key(&self) -> Option<ObjectKey> {
        ObjectKey::from_resource(self)
    }

    fn version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}

impl Cacheable for Exposure {
    fn cache_key(&self) -> Option<ObjectKey> {
        self.key()
    }

    fn version(&self) -> Option<&str> {
        self.resource_version()
    }
}

/// 并发安全的键值缓存
pub struct Store<K> {
    /// 缓存数据
    items: Arc<RwLock<HashMap<ObjectKey, Arc<K>>>>,
    /// 是否已完成首次列举
    synced: Arc<watch::Sender<bool>>,
}

impl<K> Clone for Store<K> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            synced: self.synced.clone(),
        }
    }
}

impl<K: Cacheable> Default for Store<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Cacheable> Store<K> {
    /// 创建空缓存
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            synced: Arc::new(synced),
        }
    }

    /// 读取对象
    pub async fn get(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.items.read().await.get(key).cloned()
    }

    /// 写入对象
    ///
    /// 返回缓存是否发生变化；资源版本相同的重复通知返回 `false`。
    pub async fn set(&self, key: ObjectKey, obj: K) -> bool {
        let mut items = self.items.write().await;
        if let Some(existing) = items.get(&key) {
            if existing.version().is_some() && existing.version() == obj.version() {
                debug!("忽略重复通知: {}", key);
                return false;
            }
        }
        items.insert(key, Arc::new(obj));
        true
    }

    /// 删除对象
    pub async fn delete(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.items.write().await.remove(key)
    }

    /// 用完整列举结果替换缓存内容
    ///
    /// 返回受影响的全部键：列举中的键以及从缓存中消失的键。
    pub async fn replace(&self, objects: Vec<K>) -> Vec<ObjectKey> {
        let mut fresh = HashMap::with_capacity(objects.len());
        for obj in objects {
            if let Some(key) = obj.cache_key() {
                fresh.insert(key, Arc::new(obj));
            }
        }

        let mut items = self.items.write().await;
        let mut affected: Vec<ObjectKey> = fresh.keys().cloned().collect();
        affected.extend(items.keys().filter(|key| !fresh.contains_key(*key)).cloned());
        *items = fresh;
        drop(items);

        self.mark_synced();
        affected
    }

    /// 用周期性列举结果刷新缓存
    ///
    /// 列举与监听流之间没有顺序保证，因此只用资源版本更新的对象覆盖已有条目，
    /// 不新增也不移除条目；新增与删除以监听流及其重新列举为准。
    /// 返回刷新后缓存中的全部键。
    pub async fn refresh(&self, objects: Vec<K>) -> Vec<ObjectKey> {
        let mut items = self.items.write().await;
        for obj in objects {
            let Some(key) = obj.cache_key() else { continue };
            if let Some(existing) = items.get_mut(&key) {
                if is_newer(obj.version(), existing.version()) {
                    debug!("列举结果比缓存新，刷新: {}", key);
                    *existing = Arc::new(obj);
                }
            }
        }
        items.keys().cloned().collect()
    }

    /// 当前全部键
    pub async fn keys(&self) -> Vec<ObjectKey> {
        self.items.read().await.keys().cloned().collect()
    }

    /// 缓存条目数
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// 缓存是否为空
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// 标记首次列举完成
    pub fn mark_synced(&self) {
        self.synced.send_replace(true);
    }

    /// 是否已完成首次列举
    pub fn is_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// 等待首次列举完成
    pub async fn wait_synced(&self) {
        let mut rx = self.synced.subscribe();
        // 发送端与缓存同生命周期，不会提前关闭
        let _ = rx.wait_for(|synced| *synced).await;
    }
}

/// `listed` 的资源版本是否比 `cached` 新；任一无法解析为整数时视为不新
fn is_newer(listed: Option<&str>, cached: Option<&str>) -> bool {
    let parse = |version: Option<&str>| version.and_then(|v| v.parse::<u64>().ok());
    match (parse(listed), parse(cached)) {
        (Some(listed), Some(cached)) => listed > cached,
        _ => false,
    }
}
