//! Xposer 控制器
//!
//! 该模块实现 Xposer 的协调引擎：监听 Service，按注解为其生成并维护
//! Ingress（Kubernetes）或 Route（OpenShift）。引擎只通过 [`ClusterApi`]
//! 访问集群，具体的 kube-rs 实现由 operator 提供。

pub mod cache;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod exposure;
pub mod queue;
pub mod reconcile;
pub mod source;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cluster::{
    reasons, ClusterApi, ClusterFlavor, EventSeverity, ExposureEvent, WatchEvent, WatchStream,
};
pub use config::ControllerConfig;
pub use controller::Controller;
pub use exposure::{Exposure, ExposureKind};
pub use reconcile::{Outcome, Reconciler};
