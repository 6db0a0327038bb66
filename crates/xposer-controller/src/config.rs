//! 控制器配置
//!
//! 进程生命周期内不变的暴露策略默认值和调度参数。由引导层加载，
//! 启动时校验一次，此后只读。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use xposer_common::{Error, Result};

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// 监听的命名空间，空字符串表示所有命名空间
    pub namespace_scope: String,
    /// 启用暴露的注解键
    pub expose_annotation_key: String,
    /// 其他 Xposer 注解的前缀
    pub annotation_prefix: String,
    /// 未设置暴露注解时是否默认暴露
    pub expose_by_default: bool,
    /// 主机名模板，支持 {name}、{namespace}、{domain}
    pub host_template: String,
    /// 模板中 {domain} 的取值
    pub domain: String,
    /// 默认路径
    pub default_path: String,
    /// 默认是否启用 TLS
    pub tls_enabled_default: bool,
    /// Ingress TLS Secret 名称模板
    pub tls_secret_template: String,
    /// Ingress 类名，Route 忽略
    pub ingress_class: Option<String>,
    /// 并发工作者数量
    pub worker_count: usize,
    /// 全量重新同步间隔（秒）
    pub resync_interval_seconds: u64,
    /// 单个键的最大重试次数
    pub max_retries: u32,
    /// 重试退避基数（毫秒）
    pub retry_base_delay_millis: u64,
    /// 重试退避上限（秒）
    pub retry_max_delay_seconds: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace_scope: String::new(),
            expose_annotation_key: "xposer.stakater.com/expose".to_string(),
            annotation_prefix: "xposer.stakater.com".to_string(),
            expose_by_default: false,
            host_template: "{name}.{namespace}.{domain}".to_string(),
            domain: "example.com".to_string(),
            default_path: "/".to_string(),
            tls_enabled_default: false,
            tls_secret_template: "{name}-tls".to_string(),
            ingress_class: None,
            worker_count: 2,
            resync_interval_seconds: 300, // 默认 5 分钟
            max_retries: 5,
            retry_base_delay_millis: 500,
            retry_max_delay_seconds: 300,
        }
    }
}

impl ControllerConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config("workerCount 必须大于 0".to_string()));
        }
        if self.resync_interval_seconds == 0 {
            return Err(Error::Config("resyncIntervalSeconds 必须大于 0".to_string()));
        }
        if self.host_template.trim().is_empty() {
            return Err(Error::Config("hostTemplate 不能为空".to_string()));
        }
        if self.expose_annotation_key.trim().is_empty() {
            return Err(Error::Config("exposeAnnotationKey 不能为空".to_string()));
        }
        if !self.default_path.starts_with('/') {
            return Err(Error::Config(format!(
                "defaultPath 必须以 '/' 开头: {}",
                self.default_path
            )));
        }
        Ok(())
    }

    /// 是否监听所有命名空间
    pub fn watches_all_namespaces(&self) -> bool {
        self.namespace_scope.is_empty()
    }

    /// 拼接带前缀的注解键
    pub fn annotation(&self, suffix: &str) -> String {
        format!("{}/{}", self.annotation_prefix, suffix)
    }

    /// 全量重新同步间隔
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_seconds)
    }

    /// 重试退避基数
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_millis)
    }

    /// 重试退避上限
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_secs(self.retry_max_delay_seconds)
    }
}
