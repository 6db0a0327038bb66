//! 集群类型探测
//!
//! 读取 API 服务器根路径：存在 `/oapi` 或 `/apis/route.openshift.io` 即为 OpenShift。

use anyhow::{Context, Result};
use kube::Client;
use serde::Deserialize;
use tracing::info;
use xposer_controller::ClusterFlavor;

/// OpenShift 特有的 API 路径
const OPENSHIFT_PATHS: [&str; 2] = ["/oapi", "/apis/route.openshift.io"];

/// API 服务器根路径列表
#[derive(Debug, Deserialize)]
struct RootPaths {
    #[serde(default)]
    paths: Vec<String>,
}

/// 根路径中是否包含 OpenShift API
pub fn is_openshift<S: AsRef<str>>(paths: &[S]) -> bool {
    paths
        .iter()
        .any(|path| OPENSHIFT_PATHS.contains(&path.as_ref()))
}

/// 从根路径响应体推断集群类型
pub fn flavor_from_root(body: &str) -> Result<ClusterFlavor> {
    let root: RootPaths = serde_json::from_str(body).context("解析 API 根路径失败")?;
    Ok(if is_openshift(&root.paths) {
        ClusterFlavor::OpenShift
    } else {
        ClusterFlavor::Kubernetes
    })
}

/// 探测集群类型，请求失败时返回错误
pub async fn detect_flavor(client: &Client) -> Result<ClusterFlavor> {
    let request = http::Request::get("/")
        .body(Vec::new())
        .context("构建根路径请求失败")?;
    let body = client
        .request_text(request)
        .await
        .context("读取 API 根路径失败")?;

    let flavor = flavor_from_root(&body)?;
    info!("探测到集群类型: {}", flavor);
    Ok(flavor)
}
