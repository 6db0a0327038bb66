//! Xposer - 为带注解的 Service 自动创建 Ingress 或 Route

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xposer_operator::settings::{self, Overrides};
use xposer_operator::XposerOperator;

/// Xposer - 按 Service 注解维护 Ingress（Kubernetes）或 Route（OpenShift）
#[derive(Parser, Debug)]
#[command(name = "xposer", version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（YAML 或 JSON）
    #[arg(long, env = "CONFIG_FILE_PATH")]
    config: Option<PathBuf>,

    /// 监听的命名空间，空字符串表示全部
    #[arg(long, env = "KUBERNETES_NAMESPACE")]
    namespace: Option<String>,

    /// 工作者数量
    #[arg(long)]
    workers: Option<usize>,

    /// 未设置 RUST_LOG 时使用的日志级别
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let overrides = Overrides {
        namespace: cli.namespace,
        workers: cli.workers,
    };
    let config = settings::load(cli.config.as_deref(), &overrides)?;

    let operator = XposerOperator::new(config).await?;
    let stop = operator.stop_token();
    tokio::spawn(wait_for_signal(stop));

    if let Err(e) = operator.start().await {
        error!("Xposer 异常退出: {:#}", e);
        return Err(e);
    }
    info!("Xposer 已退出");
    Ok(())
}

/// 等待 Ctrl-C 或 SIGTERM 后发出停止信号
async fn wait_for_signal(stop: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!("无法监听 SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("收到退出信号");
    stop.cancel();
}
