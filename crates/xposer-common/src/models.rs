//! Xposer 数据模型
//!
//! 包括协调键、OpenShift Route 资源定义和主机名模板。

pub mod host;
pub mod key;
pub mod route;

/// 标记由 Xposer 管理的暴露资源的标签键
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// 标记由 Xposer 管理的暴露资源的标签值
pub const MANAGED_BY_VALUE: &str = "xposer";

/// 监听暴露资源时使用的标签选择器
pub fn managed_selector() -> String {
    format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}")
}
