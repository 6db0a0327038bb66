//! 错误处理模块
//!
//! 该模块提供 Xposer 项目的统一错误处理机制，区分集群 API 错误、
//! 暴露策略错误和配置错误，并为协调循环给出重试策略。

use thiserror::Error;

/// 集群 API 错误
///
/// 由集群访问层对底层客户端错误进行分类后得到，协调器只依赖这些分类。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 资源版本冲突（乐观并发失败）
    #[error("资源版本冲突: {0}")]
    Conflict(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 资源已存在
    #[error("资源已存在: {0}")]
    AlreadyExists(String),

    /// 请求失败（超时、限流、服务端错误等）
    #[error("API 请求失败: {0}")]
    Request(String),

    /// 监听流错误
    #[error("监听流错误: {0}")]
    Watch(String),
}

/// 暴露策略错误
///
/// Service 注解或配置无法推导出合法的暴露资源。重试无法自愈，
/// 需要用户修改 Service。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// 注解值格式错误
    #[error("注解 {key} 的值无效: {value:?}")]
    InvalidAnnotation { key: String, value: String },

    /// 主机名模板错误
    #[error("主机名模板无效: {0}")]
    InvalidTemplate(String),

    /// 主机名不合法
    #[error("主机名不合法: {0}")]
    InvalidHost(String),

    /// 路径不合法
    #[error("路径必须以 '/' 开头: {0}")]
    InvalidPath(String),

    /// Service 没有端口
    #[error("Service {0} 没有定义任何端口")]
    NoPorts(String),

    /// 指定的端口不存在
    #[error("Service {service} 中不存在端口 {port}")]
    UnknownPort { service: String, port: String },

    /// Service 缺少元数据
    #[error("Service 缺少元数据字段: {0}")]
    MissingMetadata(&'static str),

    /// 同名资源不由 Xposer 管理
    #[error("{0} 已存在且不由 Xposer 管理")]
    ForeignObject(String),
}

/// Xposer 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 暴露策略错误
    #[error("策略错误: {0}")]
    Policy(#[from] PolicyError),

    /// 集群 API 错误
    #[error("集群错误: {0}")]
    Api(#[from] ApiError),
}

/// 失败后的重新入队方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// 短暂固定延迟后重新入队，不计入退避
    Requeue,
    /// 按指数退避重新入队
    Backoff,
    /// 不重试
    None,
}

impl Error {
    /// 根据错误分类给出重试策略
    pub fn retry_strategy(&self) -> RetryStrategy {
        match self {
            Error::Api(ApiError::Conflict(_)) => RetryStrategy::Requeue,
            Error::Api(ApiError::NotFound(_)) => RetryStrategy::None,
            Error::Api(_) => RetryStrategy::Backoff,
            Error::Policy(_) => RetryStrategy::Backoff,
            Error::Config(_) => RetryStrategy::None,
        }
    }

    /// 是否为暴露策略错误
    pub fn is_policy(&self) -> bool {
        matches!(self, Error::Policy(_))
    }
}

/// Xposer 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;
