//! 暴露策略
//!
//! 从 Service 注解和配置默认值推导是否暴露以及暴露参数。
//! 这里只做纯计算，不访问集群。

use k8s_openapi::api::core::v1::{Service, ServicePort};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use xposer_common::models::host::{render_host, render_template, validate_host, TemplateVars};
use xposer_common::{ObjectKey, PolicyError};

use super::{BackendPort, ExposureSpec, TlsSettings};
use crate::config::ControllerConfig;

/// 注解后缀
pub mod suffix {
    /// 显式主机名
    pub const HOST: &str = "host";
    /// 单个 Service 的主机名模板
    pub const HOST_TEMPLATE: &str = "host-template";
    /// 路径
    pub const PATH: &str = "path";
    /// 是否启用 TLS
    pub const TLS: &str = "tls";
    /// TLS Secret 名称
    pub const TLS_SECRET: &str = "tls-secret";
    /// 端口名称或端口号
    pub const PORT: &str = "port";
}

/// 判断 Service 是否需要暴露
///
/// 注解为 `true` 时暴露，为 `false` 时不暴露，缺失时取配置默认值。
pub fn exposure_enabled(service: &Service, config: &ControllerConfig) -> Result<bool, PolicyError> {
    Ok(parse_bool(service.annotations(), &config.expose_annotation_key)?
        .unwrap_or(config.expose_by_default))
}

/// 计算期望的暴露参数
pub fn desired_spec(service: &Service, config: &ControllerConfig) -> Result<ExposureSpec, PolicyError> {
    let key = ObjectKey::from_resource(service).ok_or(PolicyError::MissingMetadata("name/namespace"))?;
    let owner = service
        .controller_owner_ref(&())
        .ok_or(PolicyError::MissingMetadata("uid"))?;
    let annotations = service.annotations();
    let vars = TemplateVars {
        name: &key.name,
        namespace: &key.namespace,
        domain: &config.domain,
    };

    let host = match non_empty(annotations, &config.annotation(suffix::HOST)) {
        Some(host) => {
            validate_host(host)?;
            host.to_string()
        }
        None => {
            let template = non_empty(annotations, &config.annotation(suffix::HOST_TEMPLATE))
                .unwrap_or(config.host_template.as_str());
            render_host(template, &vars)?
        }
    };

    let path = non_empty(annotations, &config.annotation(suffix::PATH))
        .unwrap_or(config.default_path.as_str())
        .to_string();
    if !path.starts_with('/') {
        return Err(PolicyError::InvalidPath(path));
    }

    let tls_enabled = parse_bool(annotations, &config.annotation(suffix::TLS))?
        .unwrap_or(config.tls_enabled_default);
    let tls = if tls_enabled {
        let secret_name = match non_empty(annotations, &config.annotation(suffix::TLS_SECRET)) {
            Some(secret) => secret.to_string(),
            None => render_template(&config.tls_secret_template, &vars)?,
        };
        Some(TlsSettings {
            secret_name: Some(secret_name).filter(|s| !s.is_empty()),
        })
    } else {
        None
    };

    let requested_port = non_empty(annotations, &config.annotation(suffix::PORT));
    let port = select_port(service, &key, requested_port)?;

    Ok(ExposureSpec {
        key,
        host,
        path,
        tls,
        port,
        owner,
        ingress_class: config.ingress_class.clone().filter(|class| !class.is_empty()),
    })
}

fn non_empty<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_bool(annotations: &BTreeMap<String, String>, key: &str) -> Result<Option<bool>, PolicyError> {
    match annotations.get(key) {
        None => Ok(None),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(PolicyError::InvalidAnnotation {
                key: key.to_string(),
                value: value.clone(),
            }),
        },
    }
}

/// 选择后端端口：按注解中的名称或端口号匹配，否则取第一个端口
fn select_port(
    service: &Service,
    key: &ObjectKey,
    requested: Option<&str>,
) -> Result<BackendPort, PolicyError> {
    let ports: &[ServicePort] = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default();

    let port = match requested {
        None => ports.first().ok_or_else(|| PolicyError::NoPorts(key.to_string()))?,
        Some(requested) => {
            let by_number = requested.parse::<i32>().ok();
            ports
                .iter()
                .find(|p| p.name.as_deref() == Some(requested) || Some(p.port) == by_number)
                .ok_or_else(|| PolicyError::UnknownPort {
                    service: key.to_string(),
                    port: requested.to_string(),
                })?
        }
    };

    Ok(BackendPort {
        name: port.name.clone().filter(|name| !name.is_empty()),
        number: port.port,
        target_port: port.target_port.clone(),
    })
}
