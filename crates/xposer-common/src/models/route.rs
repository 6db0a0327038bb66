//! OpenShift Route 资源定义
//!
//! k8s-openapi 不包含 OpenShift 的 `route.openshift.io/v1` 类型，这里只定义
//! Xposer 读写所需的字段；其余字段原样保存在 `extra` 中，写回时不会丢失。

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Route 规范
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(group = "route.openshift.io", version = "v1", kind = "Route", namespaced)]
#[kube(schema = "disabled", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// 对外主机名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// 路由路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// 后端 Service
    pub to: RouteTargetReference,

    /// 后端端口
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,

    /// TLS 配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// 通配符策略，由服务端默认为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_policy: Option<String>,

    /// 未建模的字段，如 `alternateBackends`、`subdomain`
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Route 后端引用
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    /// 后端类型，固定为 Service
    pub kind: String,

    /// 后端名称
    pub name: String,

    /// 权重
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

/// Route 端口
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// 目标端口，名称或端口号
    pub target_port: IntOrString,
}

/// Route TLS 配置
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// 终止方式：edge、passthrough、reencrypt
    pub termination: String,

    /// 非加密流量处理策略：Allow、Redirect、None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,

    /// 未建模的字段，如 `certificate`、`key`、`caCertificate`
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
