//! # resguard-app
//!
//! resguard 바이너리 진입점.
//! 설정 로드, 어댑터 조립, 워치독 실행, 이벤트 로깅, 시그널 종료.

mod lifecycle;
mod wiring;

use anyhow::{Context, Result};
use clap::Parser;
use resguard_core::config::AppConfig;
use resguard_core::config_manager::ConfigManager;
use resguard_core::models::alert::{Alert, AlertLevel};
use resguard_core::models::event::WatchdogEvent;
use resguard_core::models::health::HealthState;
use resguard_core::models::metrics::SystemMetrics;
use resguard_watchdog::threshold;
use resguard_watchdog::WatchdogController;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;

/// 종료 시 모니터링 루프 대기 시간
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// 종료 후 남은 이벤트 기록 대기 시간
const LOGGER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// resguard 리소스 워치독
///
/// GPU/CPU/RAM과 감시 대상 프로세스 수를 주기적으로 확인한다.
#[derive(Parser, Debug)]
#[command(name = "resguard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 수집 주기 (초)
    #[arg(long, short = 'i')]
    interval: Option<f64>,

    /// VRAM 경고 임계값 (%)
    #[arg(long)]
    vram_threshold: Option<f64>,

    /// 감시 대상 프로세스 최대 개수
    #[arg(long)]
    max_processes: Option<u32>,

    /// 프로세스 수 CRITICAL 시 긴급 정리/강제 종료 활성화
    #[arg(long)]
    self_terminate: bool,

    /// 한 번 수집해 JSON으로 출력하고 종료
    #[arg(long)]
    once: bool,

    /// 적용될 설정을 JSON으로 출력하고 종료
    #[arg(long)]
    print_config: bool,
}

/// `--once` 출력
#[derive(Serialize)]
struct OnceReport<'a> {
    metrics: &'a SystemMetrics,
    alerts: &'a [Alert],
}

/// CLI 인자로 설정 덮어쓰기
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    let watchdog = &mut config.watchdog;
    if let Some(interval) = args.interval {
        watchdog.check_interval_seconds = interval;
    }
    if let Some(threshold) = args.vram_threshold {
        watchdog.vram_threshold_percent = threshold;
    }
    if let Some(max) = args.max_processes {
        watchdog.max_monitored_processes = max;
    }
    if args.self_terminate {
        watchdog.self_terminate_on_critical = true;
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("설정 로드 실패")?;
    info!("설정 파일: {}", config_manager.config_path().display());

    let mut config = config_manager.get();
    apply_overrides(&mut config, args);
    config
        .watchdog
        .validate()
        .context("CLI 인자 적용 후 설정이 유효하지 않음")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "resguard={0},resguard_app={0},resguard_core={0},resguard_monitor={0},resguard_watchdog={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let collaborators =
        wiring::build_collaborators(&config.monitor).context("모니터 어댑터 생성 실패")?;
    let mut controller = WatchdogController::new(config.watchdog, collaborators)
        .context("워치독 생성 실패")?;

    if args.once {
        let metrics = controller.collect_once().await;
        let alerts = threshold::evaluate(&metrics, controller.config());
        let report = OnceReport {
            metrics: &metrics,
            alerts: &alerts,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let lifecycle = LifecycleManager::new();
    let logger = tokio::spawn(log_events(controller.subscribe(), lifecycle.subscribe()));

    info!("resguard 시작");
    controller.start();

    lifecycle
        .wait_for_signal()
        .await
        .context("시그널 핸들러 등록 실패")?;

    if !controller.stop(SHUTDOWN_TIMEOUT).await {
        warn!("모니터링 루프 강제 취소");
    }
    drop(controller);
    let _ = tokio::time::timeout(LOGGER_DRAIN_TIMEOUT, logger).await;

    info!("resguard 종료");
    Ok(())
}

/// 버스가 닫힐 때까지 모든 이벤트를 로그로 남긴다
async fn log_events(
    mut events: broadcast::Receiver<WatchdogEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut draining = false;
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("이벤트 {skipped}개 누락"),
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.changed(), if !draining => {
                draining = true;
                debug!("종료 진행 중, 남은 이벤트 기록");
            }
        }
    }
}

fn log_event(event: &WatchdogEvent) {
    match event {
        WatchdogEvent::MetricsReady { metrics } => debug!(
            "VRAM {:.1}% | CPU {:.1}% | RAM {:.1}% | 프로세스 {} (감시 {})",
            metrics.vram_percent,
            metrics.cpu_percent,
            metrics.ram_percent,
            metrics.process_count,
            metrics.monitored_process_count
        ),
        WatchdogEvent::MetricsDegraded { reason, .. } => warn!("성능 저하 메트릭: {reason}"),
        WatchdogEvent::AlertTriggered { level, message } => match level {
            AlertLevel::Critical => error!("[CRITICAL] {message}"),
            AlertLevel::Warning => warn!("[WARNING] {message}"),
        },
        WatchdogEvent::ErrorOccurred { message } => error!("워치독 에러: {message}"),
        WatchdogEvent::ErrorRecovered { message } => info!("{message}"),
        WatchdogEvent::CircuitOpened { reason } => warn!("서킷 열림: {reason}"),
        WatchdogEvent::CircuitClosed => info!("서킷 닫힘"),
        WatchdogEvent::StatusChanged { status } => debug!(
            "상태: 점검 {}회, 에러 {}회, 서킷 {}",
            status.total_checks, status.error_count, status.circuit_state
        ),
        WatchdogEvent::HealthCheckCompleted { health } => {
            let healthy = health
                .values()
                .filter(|h| h.state == HealthState::Healthy)
                .count();
            info!("헬스 체크: {healthy}/{} 정상", health.len());
        }
        WatchdogEvent::CleanupStarted { count } => warn!("긴급 정리 시작: 감시 대상 {count}개"),
        WatchdogEvent::CleanupCompleted { result } => info!(
            "긴급 정리 완료: 종료 {}개, 실패 {}개",
            result.terminated, result.failed
        ),
        WatchdogEvent::EmergencyShutdownInitiated { reason } => error!("긴급 종료: {reason}"),
        WatchdogEvent::MonitoringStarted => info!("모니터링 시작"),
        WatchdogEvent::MonitoringStopped => info!("모니터링 중단"),
        WatchdogEvent::MonitoringPaused => info!("모니터링 일시정지"),
        WatchdogEvent::MonitoringResumed => info!("모니터링 재개"),
    }
}
