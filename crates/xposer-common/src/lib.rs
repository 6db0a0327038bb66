//! Xposer Common - 跨模块共享工具与数据结构
//!
//! 该模块提供 Xposer 项目中所有组件共享的数据结构和错误处理。
//! 包括协调键、Route 资源模型、主机名模板以及统一的错误类型。

pub mod error;
pub mod models;

/// 重新导出常用类型，方便使用
pub use error::{ApiError, Error, PolicyError, Result, RetryStrategy};
pub use models::key::ObjectKey;
pub use models::route::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};
pub use models::{managed_selector, MANAGED_BY_LABEL, MANAGED_BY_VALUE};
