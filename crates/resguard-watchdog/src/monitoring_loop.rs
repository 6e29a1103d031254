//! 모니터링 루프.
//!
//! 수집 → 평가 → 발행을 `check_interval`마다 반복하는 백그라운드 작업과,
//! 별도 주기로 건강 상태를 발행하는 헬스 체크 작업을 띄운다.
//! 제어는 `watch` 채널 하나(`LoopControl`)로 한다.
//!
//! - 일시정지는 진행 중인 주기를 끝까지 돌린 뒤 적용된다.
//! - 대기는 최대 1초 단위로 쪼개 제어 변경에 바로 반응한다.
//! - 재개하면 주기 시작 시점 기준으로 남은 시간만 기다린다.
//! - 한 주기의 에러나 패닉은 로그와 이벤트로 남기고 다음 주기로 넘어간다.

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use resguard_core::config::WatchdogConfig;
use resguard_core::error::CoreError;
use resguard_core::models::event::WatchdogEvent;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::SystemMetrics;
use resguard_core::models::status::WatchdogStatus;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::aggregator::MetricsAggregator;
use crate::circuit_breaker::CircuitBreaker;
use crate::collaborators::Collaborators;
use crate::emergency::EmergencyCoordinator;
use crate::event_bus::EventBus;
use crate::fallback::FallbackCache;
use crate::guard::CallGuard;
use crate::health::ComponentHealthTracker;
use crate::threshold;

/// 대기 한 조각의 최대 길이
const WAIT_SLICE: Duration = Duration::from_secs(1);

/// 루프 제어 신호
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Run,
    Pause,
    Stop,
}

/// 루프가 공유하는 컴포넌트
///
/// 브레이커, 건강 상태, 캐시, 버스는 컨트롤러 소유라 재시작해도 유지된다.
pub struct LoopDeps {
    pub config: WatchdogConfig,
    pub collaborators: Collaborators,
    pub breaker: Arc<CircuitBreaker>,
    pub health: Arc<ComponentHealthTracker>,
    pub cache: Arc<FallbackCache>,
    pub bus: EventBus,
}

#[derive(Debug, Default)]
struct Counters {
    last_check_time: Option<chrono::DateTime<Utc>>,
    total_checks: u64,
    error_count: u64,
}

/// 루프 작업 컨텍스트
struct LoopContext {
    config: WatchdogConfig,
    breaker: Arc<CircuitBreaker>,
    health: Arc<ComponentHealthTracker>,
    cache: Arc<FallbackCache>,
    aggregator: MetricsAggregator,
    emergency: EmergencyCoordinator,
    bus: EventBus,
    control: watch::Receiver<LoopControl>,
    counters: Mutex<Counters>,
    /// 직전 주기가 실패했는지 (`error_recovered` 판단용)
    had_failure: AtomicBool,
}

impl LoopContext {
    fn status(&self, running: bool) -> WatchdogStatus {
        let counters = self.counters.lock();
        WatchdogStatus {
            running,
            paused: *self.control.borrow() == LoopControl::Pause,
            last_check_time: counters.last_check_time,
            circuit_state: self.breaker.state(),
            component_health: self.health.snapshot(),
            cache_age_seconds: self.cache.age().map(|age| age.as_secs_f64()),
            total_checks: counters.total_checks,
            error_count: counters.error_count,
            uptime_seconds: self.aggregator.uptime_seconds(),
        }
    }

    fn record_error(&self, message: String) {
        self.counters.lock().error_count += 1;
        self.had_failure.store(true, Ordering::SeqCst);
        self.bus.publish(WatchdogEvent::ErrorOccurred { message });
    }

    /// 주기 하나를 실행하고 에러와 패닉을 흡수
    async fn run_cycle_guarded(&self) {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("모니터링 주기 실패: {e}");
                self.record_error(e.to_string());
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "알 수 없는 패닉".to_string());
                error!("모니터링 주기 패닉: {message}");
                self.record_error(format!("모니터링 주기 패닉: {message}"));
            }
        }
    }

    async fn run_cycle(&self) -> Result<(), CoreError> {
        if self.breaker.ready_for_trial() {
            self.health.begin_recovery();
        }

        let outcome = self.breaker.execute(|| self.aggregator.collect()).await;
        let (metrics, live_process_count) = match outcome {
            Ok(collection) => {
                ensure_finite(&collection.metrics)?;
                if collection.is_complete() {
                    self.cache.update(&collection.metrics);
                }
                self.bus.publish(WatchdogEvent::MetricsReady {
                    metrics: collection.metrics.clone(),
                });
                if self.had_failure.swap(false, Ordering::SeqCst) {
                    info!("메트릭 수집 복구");
                    self.bus.publish(WatchdogEvent::ErrorRecovered {
                        message: "메트릭 수집 복구".to_string(),
                    });
                }
                let live = !collection.degraded.contains(&Component::ProcessCount);
                (collection.metrics, live)
            }
            Err(e) => {
                let reason = e.to_string();
                if matches!(e, CoreError::CircuitOpen { .. }) {
                    debug!("서킷 열림, 수집 생략: {reason}");
                } else {
                    warn!("메트릭 수집 실패: {reason}");
                    self.record_error(reason.clone());
                }
                let degraded = self
                    .cache
                    .get_or_default(&reason, self.aggregator.uptime_seconds());
                self.bus.publish(WatchdogEvent::MetricsDegraded {
                    metrics: degraded.metrics.clone(),
                    reason: degraded.reason,
                });
                (degraded.metrics, false)
            }
        };

        let alerts = threshold::evaluate(&metrics, &self.config);
        for alert in &alerts {
            warn!("[{:?}] {}", alert.level, alert.message);
            self.bus.publish(WatchdogEvent::AlertTriggered {
                level: alert.level,
                message: alert.message.clone(),
            });
        }

        if self.config.self_terminate_on_critical && threshold::has_process_critical(&alerts) {
            if live_process_count {
                self.emergency
                    .handle(metrics.monitored_process_count, &self.aggregator)
                    .await;
            } else {
                warn!("프로세스 수가 실측값이 아니라 긴급 조치 보류");
            }
        }

        {
            let mut counters = self.counters.lock();
            counters.last_check_time = Some(Utc::now());
            counters.total_checks += 1;
        }
        self.bus.publish(WatchdogEvent::StatusChanged {
            status: self.status(true),
        });
        Ok(())
    }
}

/// 스냅샷에 NaN/무한대가 섞이면 캐시와 발행 전에 주기를 중단한다
fn ensure_finite(metrics: &SystemMetrics) -> Result<(), CoreError> {
    let values = [
        metrics.vram_used_mb,
        metrics.vram_total_mb,
        metrics.vram_percent,
        metrics.cpu_percent,
        metrics.ram_used_mb,
        metrics.ram_percent,
    ];
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CoreError::Internal(format!(
            "비정상 메트릭 값: {metrics:?}"
        )))
    }
}

/// 실행 중인 모니터링 루프 핸들
pub struct MonitoringLoop {
    control: watch::Sender<LoopControl>,
    ctx: Arc<LoopContext>,
    task: Option<JoinHandle<()>>,
    health_task: Option<JoinHandle<()>>,
}

impl MonitoringLoop {
    /// 루프 시작: `monitoring_started` 발행
    pub fn start(deps: LoopDeps) -> Self {
        let LoopDeps {
            config,
            collaborators,
            breaker,
            health,
            cache,
            bus,
        } = deps;

        let (control, control_rx) = watch::channel(LoopControl::Run);
        let guard = CallGuard::new(config.circuit_breaker.call_timeout());
        cache.configure(config.cache_freshness(), config.vram_total_mb);

        let aggregator =
            MetricsAggregator::new(&collaborators, &config, health.clone(), Instant::now());
        let emergency = EmergencyCoordinator::new(
            collaborators.cleaner.clone(),
            collaborators.shutdown.clone(),
            guard,
            bus.clone(),
            config.max_monitored_processes,
            config.cleanup_grace(),
        );

        let ctx = Arc::new(LoopContext {
            config,
            breaker,
            health,
            cache,
            aggregator,
            emergency,
            bus,
            control: control_rx.clone(),
            counters: Mutex::new(Counters::default()),
            had_failure: AtomicBool::new(false),
        });

        info!(
            "모니터링 시작: 주기 {:?}, 헬스 체크 {:?}",
            ctx.config.check_interval(),
            ctx.config.health_check_interval()
        );
        ctx.bus.publish(WatchdogEvent::MonitoringStarted);

        let task = tokio::spawn(run_monitoring(ctx.clone(), control_rx.clone()));
        let health_task = tokio::spawn(run_health_checks(ctx.clone(), control_rx));

        Self {
            control,
            ctx,
            task: Some(task),
            health_task: Some(health_task),
        }
    }

    /// 일시정지: 실행 중일 때만 적용
    pub fn pause(&self) -> bool {
        let changed = self.control.send_if_modified(|state| {
            if *state == LoopControl::Run {
                *state = LoopControl::Pause;
                true
            } else {
                false
            }
        });
        if changed {
            info!("모니터링 일시정지");
            self.ctx.bus.publish(WatchdogEvent::MonitoringPaused);
        }
        changed
    }

    /// 재개: 일시정지 상태일 때만 적용
    pub fn resume(&self) -> bool {
        let changed = self.control.send_if_modified(|state| {
            if *state == LoopControl::Pause {
                *state = LoopControl::Run;
                true
            } else {
                false
            }
        });
        if changed {
            info!("모니터링 재개");
            self.ctx.bus.publish(WatchdogEvent::MonitoringResumed);
        }
        changed
    }

    pub fn is_paused(&self) -> bool {
        *self.control.borrow() == LoopControl::Pause
    }

    pub fn status(&self) -> WatchdogStatus {
        self.ctx.status(true)
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.ctx.config
    }

    /// 중단: 타임아웃 안에 끝나지 않으면 작업을 강제 취소
    ///
    /// 정상 종료했으면 true. 어느 쪽이든 `monitoring_stopped`를 발행한다.
    pub async fn stop(mut self, timeout: Duration) -> bool {
        self.control.send_replace(LoopControl::Stop);

        let mut task = self.task.take();
        let mut health_task = self.health_task.take();
        let graceful = tokio::time::timeout(timeout, async {
            if let Some(task) = task.as_mut() {
                let _ = task.await;
            }
            if let Some(task) = health_task.as_mut() {
                let _ = task.await;
            }
        })
        .await
        .is_ok();

        if !graceful {
            warn!("모니터링 작업이 {timeout:?} 안에 끝나지 않아 강제 취소");
            for task in [task, health_task].into_iter().flatten() {
                task.abort();
            }
        }

        info!("모니터링 중단");
        self.ctx.bus.publish(WatchdogEvent::MonitoringStopped);
        graceful
    }
}

impl Drop for MonitoringLoop {
    fn drop(&mut self) {
        self.control.send_replace(LoopControl::Stop);
    }
}

/// 수집 주기 작업
async fn run_monitoring(ctx: Arc<LoopContext>, mut control: watch::Receiver<LoopControl>) {
    let interval = ctx.config.check_interval();
    loop {
        if !wait_until_runnable(&mut control).await {
            break;
        }
        let cycle_start = Instant::now();
        ctx.run_cycle_guarded().await;
        if !interruptible_wait(&mut control, cycle_start + interval).await {
            break;
        }
    }
    debug!("수집 작업 종료");
}

/// 헬스 체크 작업: 일시정지 중에는 건너뛴다
async fn run_health_checks(ctx: Arc<LoopContext>, mut control: watch::Receiver<LoopControl>) {
    let period = ctx.config.health_check_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = *control.borrow();
                match state {
                    LoopControl::Stop => break,
                    LoopControl::Pause => continue,
                    LoopControl::Run => {
                        let health = ctx.health.snapshot();
                        debug!("헬스 체크: {} 컴포넌트", health.len());
                        ctx.bus.publish(WatchdogEvent::HealthCheckCompleted { health });
                    }
                }
            }
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *control.borrow_and_update();
                if state == LoopControl::Stop {
                    break;
                }
            }
        }
    }
    debug!("헬스 체크 작업 종료");
}

/// Run이 될 때까지 대기. Stop이면 false
async fn wait_until_runnable(control: &mut watch::Receiver<LoopControl>) -> bool {
    loop {
        let state = *control.borrow_and_update();
        match state {
            LoopControl::Run => return true,
            LoopControl::Stop => return false,
            LoopControl::Pause => {
                if control.changed().await.is_err() {
                    return false;
                }
            }
        }
    }
}

/// `deadline`까지 조각 단위로 대기. Stop이면 false
///
/// 일시정지 중에는 시간이 지나도 다음 주기로 넘어가지 않는다.
async fn interruptible_wait(
    control: &mut watch::Receiver<LoopControl>,
    deadline: Instant,
) -> bool {
    loop {
        let state = *control.borrow_and_update();
        match state {
            LoopControl::Stop => return false,
            LoopControl::Pause => {
                if !wait_until_runnable(control).await {
                    return false;
                }
                continue;
            }
            LoopControl::Run => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let slice = (deadline - now).min(WAIT_SLICE);
        tokio::select! {
            _ = tokio::time::sleep(slice) => {}
            changed = control.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
        }
    }
}
