/// CLI Interface Module
///
/// This module is the entry point when the crate runs as a standalone service.
///
/// ## Responsibilities
/// - Parse command-line arguments (and `CPP_SERVICE_PORT`)
/// - Initialize logging
/// - Build the compute service and bind the front ends
/// - Translate SIGINT/SIGTERM into a graceful shutdown
/// - Map the outcome to a process exit code (0 clean, 1 startup failure)

use crate::application::services::{ComputeConfig, ComputeService};
use crate::domain::search::HybridSearch;
use crate::domain::validation::{QueryValidator, ValidationConfig};
use crate::infrastructure::http::{HealthChecker, HttpGateway};
use crate::infrastructure::network::{FrontDoor, FrontDoorConfig, FrontDoorError};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// 计算服务命令行配置
#[derive(Parser, Debug, Clone)]
#[command(name = "topmoves-service")]
#[command(version)]
#[command(about = "Tetris top-moves compute service", long_about = None)]
pub struct CliConfig {
    /// 服务器监听地址
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// HTTP服务端口（游戏服务器调用 `/top-moves-hybrid` 的端口）
    #[arg(short, long, env = "CPP_SERVICE_PORT", default_value_t = 4500)]
    pub port: u16,

    /// 长度前缀帧协议端口（0表示禁用）
    #[arg(long, default_value_t = 4501)]
    pub frame_port: u16,

    /// 最大并发连接数
    #[arg(short = 'c', long, default_value_t = 256)]
    pub max_connections: usize,

    /// 计算线程数（0表示自动检测CPU核心数）
    #[arg(short = 'w', long, default_value_t = 0)]
    pub compute_workers: usize,

    /// 等待完整请求帧的超时（毫秒）
    #[arg(long, default_value_t = 30_000)]
    pub read_timeout_ms: u64,

    /// 单次计算超时（毫秒，含排队）
    #[arg(long, default_value_t = 10_000)]
    pub compute_timeout_ms: u64,

    /// 写响应超时（毫秒）
    #[arg(long, default_value_t = 5_000)]
    pub write_timeout_ms: u64,

    /// 最大请求帧字节数
    #[arg(long, default_value_t = 64 * 1024)]
    pub max_frame_bytes: usize,

    /// 结果缓存条目数（0表示禁用）
    #[arg(long, default_value_t = 1024)]
    pub cache_capacity: usize,

    /// 允许的最大搜索深度
    #[arg(long, default_value_t = 4)]
    pub max_depth: u32,

    /// 允许的最大playout次数
    #[arg(long, default_value_t = 2401)]
    pub max_playout_count: u32,

    /// 关闭时等待连接结束的宽限期（毫秒）
    #[arg(long, default_value_t = 10_000)]
    pub shutdown_grace_ms: u64,

    /// 日志级别
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// 仅显示配置不启动服务器（用于调试）
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

/// 启动失败
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    FrontDoor(#[from] FrontDoorError),
}

impl CliConfig {
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.max_connections == 0 {
            return Err(StartupError::Config("--max-connections must be > 0".into()));
        }
        if self.read_timeout_ms == 0 || self.compute_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(StartupError::Config("timeouts must be > 0".into()));
        }
        if self.max_frame_bytes < 64 {
            return Err(StartupError::Config("--max-frame-bytes must be >= 64".into()));
        }
        if self.frame_port != 0 && self.frame_port == self.port {
            return Err(StartupError::Config(format!(
                "--frame-port {} collides with --port",
                self.frame_port
            )));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        if self.compute_workers == 0 {
            num_cpus::get()
        } else {
            self.compute_workers
        }
    }

    /// 帧协议前门配置；`--frame-port 0` 时为 `None`
    pub fn front_door_config(&self) -> Option<FrontDoorConfig> {
        if self.frame_port == 0 {
            return None;
        }
        Some(FrontDoorConfig {
            addr: SocketAddr::new(self.host, self.frame_port),
            max_connections: self.max_connections,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            max_frame_bytes: self.max_frame_bytes,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            ..Default::default()
        })
    }

    pub fn compute_config(&self) -> ComputeConfig {
        ComputeConfig {
            workers: self.worker_count(),
            compute_timeout: Duration::from_millis(self.compute_timeout_ms),
            cache_capacity: self.cache_capacity,
        }
    }

    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            max_depth: self.max_depth,
            max_playout_count: self.max_playout_count,
            ..Default::default()
        }
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Runs the CLI application
///
/// Parses arguments, serves until a shutdown signal arrives and returns the
/// process exit code.
pub async fn run() -> ExitCode {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "启动失败");
            eprintln!("topmoves-service: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// 启动服务并运行到关闭
pub async fn serve(config: CliConfig) -> Result<(), StartupError> {
    config.validate()?;
    info!("配置: {:?}", config);
    print_banner(&config);

    if config.dry_run {
        println!("\nDry-run 模式 - 不启动服务器");
        return Ok(());
    }

    let service = Arc::new(ComputeService::new(
        HybridSearch::default(),
        QueryValidator::with_config(config.validation_config()),
        config.compute_config(),
    ));
    let health = Arc::new(HealthChecker::default());

    // 任何一个端口绑定失败都直接退出
    let gateway = HttpGateway::bind(
        config.http_addr(),
        config.max_connections,
        Arc::clone(&service),
        Arc::clone(&health),
    )?;
    let front_door = match config.front_door_config() {
        Some(front) => Some(FrontDoor::bind(front, Arc::clone(&service))?),
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let health = Arc::clone(&health);
        tokio::spawn(async move {
            shutdown_signal().await;
            health.mark_shutting_down();
            let _ = shutdown_tx.send(true);
        });
    }

    info!("服务器已准备就绪");

    let front_door_task = front_door.map(|door| tokio::spawn(door.run(shutdown_rx.clone())));
    let result = gateway.run(shutdown_rx).await;

    if let Some(task) = front_door_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "帧协议前门异常退出"),
            Err(e) => error!(error = %e, "帧协议前门任务失败"),
        }
    }

    result?;
    info!("服务已停止");
    Ok(())
}

fn print_banner(config: &CliConfig) {
    let frames = match config.frame_port {
        0 => "禁用".to_string(),
        port => format!("{}:{}", config.host, port),
    };

    println!("========================================");
    println!("  topmoves-service v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("HTTP服务:     {}", config.http_addr());
    println!("帧协议:       {}", frames);
    println!("最大连接数:   {}", config.max_connections);
    println!("计算线程:     {}", config.worker_count());
    println!("计算超时:     {}ms", config.compute_timeout_ms);
    println!("结果缓存:     {}", config.cache_capacity);
    println!("日志级别:     {}", config.log_level);
    println!("========================================");
}

/// 等待 SIGINT 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "无法监听 SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 SIGINT，开始优雅关闭"),
        _ = terminate => info!("收到 SIGTERM，开始优雅关闭"),
    }
}

/// 初始化日志系统
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_default() {
        let config = CliConfig::parse_from(["topmoves-service"]);
        assert_eq!(config.host.to_string(), "0.0.0.0");
        // 游戏服务器直接请求 http://cpp-service:4500/top-moves-hybrid
        assert_eq!(config.http_addr().port(), 4500);
        assert_eq!(config.front_door_config().unwrap().addr.port(), 4501);
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.compute_workers, 0);
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.log_level, "info");
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_config_custom() {
        let config = CliConfig::parse_from([
            "topmoves-service",
            "--host", "127.0.0.1",
            "--port", "9000",
            "--frame-port", "9001",
            "--max-connections", "8",
            "--compute-workers", "2",
            "--read-timeout-ms", "250",
            "--compute-timeout-ms", "750",
            "--cache-capacity", "0",
            "--log-level", "debug",
            "--dry-run",
        ]);

        assert_eq!(config.port, 9000);
        assert!(config.dry_run);

        assert_eq!(config.http_addr(), "127.0.0.1:9000".parse().unwrap());
        let front = config.front_door_config().unwrap();
        assert_eq!(front.addr, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(front.max_connections, 8);
        assert_eq!(front.read_timeout, Duration::from_millis(250));

        let compute = config.compute_config();
        assert_eq!(compute.workers, 2);
        assert_eq!(compute.compute_timeout, Duration::from_millis(750));
        assert_eq!(compute.cache_capacity, 0);

        let config = CliConfig::parse_from(["topmoves-service", "--frame-port", "0"]);
        assert!(config.front_door_config().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_config_short_flags() {
        let config = CliConfig::parse_from([
            "topmoves-service",
            "-H", "192.168.1.1",
            "-p", "7000",
            "-c", "32",
            "-w", "4",
            "-l", "warn",
        ]);

        assert_eq!(config.host.to_string(), "192.168.1.1");
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let config = CliConfig::parse_from(["topmoves-service", "--max-connections", "0"]);
        assert!(matches!(config.validate(), Err(StartupError::Config(_))));

        let config = CliConfig::parse_from(["topmoves-service", "--port", "5000", "--frame-port", "5000"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["topmoves-service", "--write-timeout-ms", "0"]);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_serve_fails_on_port_in_use() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = CliConfig::parse_from([
            "topmoves-service",
            "--host", "127.0.0.1",
            "--port", &port.to_string(),
            "--frame-port", "0",
        ]);

        let err = serve(config).await.unwrap_err();
        assert!(matches!(err, StartupError::FrontDoor(FrontDoorError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_serve_fails_on_frame_port_in_use() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = CliConfig::parse_from([
            "topmoves-service",
            "--host", "127.0.0.1",
            "--port", "0",
            "--frame-port", &port.to_string(),
        ]);

        let err = serve(config).await.unwrap_err();
        assert!(matches!(err, StartupError::FrontDoor(FrontDoorError::Bind { .. })));
    }
}
