use std::sync::Arc;

use svcboot_domain::{
    hydrate_env_file, Config, ConfigError, EnvSource, ObservabilityConfig, ENV_PREFIX,
};
use svcboot_monitor::MonitoringService;
use svcboot_telemetry::{build_logger, with_trace};
use thiserror::Error;

use crate::state::AppState;

// 进程入口：从环境启动，等待 Ctrl-C，然后有序关闭。
pub async fn run() -> Result<(), BootstrapError> {
    // 1. 读取 `.env`（若存在），再对进程环境做一次快照。
    hydrate_env_file()?;
    let source = EnvSource::from_env(ENV_PREFIX)?;

    // 2. 组装配置、监控与日志。
    let state = bootstrap(&source)?;
    let logger = state.logger().clone();

    // 3. 阻塞直到收到终止信号。
    tokio::signal::ctrl_c().await?;
    logger.info("shutdown signal received");

    // 4. 关闭监控客户端；刷新可能阻塞，放到阻塞线程池中执行。
    let monitoring = Arc::clone(state.monitoring());
    tokio::task::spawn_blocking(move || monitoring.shutdown())
        .await
        .map_err(std::io::Error::other)?;
    logger.info("shutdown complete");

    Ok(())
}

/// Builds configuration, monitoring and the process logger from `source`.
/// Only business configuration errors abort; monitoring and observability
/// problems are logged and the process continues without them.
pub fn bootstrap(source: &EnvSource) -> Result<AppState, BootstrapError> {
    // 1. 在观测配置可用之前，先用默认配置的控制台日志器输出启动信息。
    let console = build_logger(&ObservabilityConfig::default(), None);

    let (config, observability, monitoring) = console.in_scope(|| {
        // 2. 业务配置：缺任何必填项都直接失败。
        let config = Config::from_source(source)?;

        // 3. 观测配置：有默认值，校验失败只告警。
        let observability = ObservabilityConfig::from_source(source)?;
        if let Err(err) = observability.validate() {
            tracing::warn!(error = %err, "observability config is invalid; continuing");
        }

        // 4. 监控服务：初始化失败时退化为无监控。
        let monitoring = MonitoringService::new(&observability);
        Ok::<_, BootstrapError>((config, observability, monitoring))
    })?;

    // 5. 根据观测配置构建正式日志器，生产环境下转发到监控后端。
    let logger = build_logger(&observability, Some(&monitoring));

    let startup = monitoring.handle().start_transaction("startup");
    let startup_logger = with_trace(&logger, startup.as_ref());
    startup_logger.in_scope(|| {
        tracing::info!(
            env = %config.env(),
            port = %config.server.port,
            monitoring = monitoring.is_enabled(),
            health_checks = observability.health_checks.enabled,
            health_check_interval = ?observability.health_checks.interval,
            checks = ?observability.health_checks.checks,
            "service bootstrapped"
        );
    });

    Ok(AppState::new(
        config,
        observability,
        logger,
        Arc::new(monitoring),
    ))
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
