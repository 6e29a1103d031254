//! 워치독 컨트롤러.
//!
//! 모니터링 루프의 시작/중단/일시정지/재개/재시작과 설정 교체를 담당한다.
//! 서킷 브레이커, 건강 상태, 폴백 캐시, 이벤트 버스는 컨트롤러가 소유하며
//! 루프를 다시 띄워도 그대로 이어진다.

use resguard_core::config::WatchdogConfig;
use resguard_core::error::CoreError;
use resguard_core::models::event::WatchdogEvent;
use resguard_core::models::metrics::SystemMetrics;
use resguard_core::models::status::{CircuitState, WatchdogStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::aggregator::MetricsAggregator;
use crate::circuit_breaker::{CircuitBreaker, Transition};
use crate::collaborators::Collaborators;
use crate::event_bus::EventBus;
use crate::fallback::FallbackCache;
use crate::health::ComponentHealthTracker;
use crate::monitoring_loop::{LoopDeps, MonitoringLoop};

/// 재시작 시 기존 루프 중단 대기 시간
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// 워치독 컨트롤러
pub struct WatchdogController {
    config: WatchdogConfig,
    collaborators: Collaborators,
    breaker: Arc<CircuitBreaker>,
    health: Arc<ComponentHealthTracker>,
    cache: Arc<FallbackCache>,
    bus: EventBus,
    monitoring: Option<MonitoringLoop>,
}

impl WatchdogController {
    /// 설정 검증 후 컨트롤러 생성 (루프는 아직 시작하지 않음)
    pub fn new(config: WatchdogConfig, collaborators: Collaborators) -> Result<Self, CoreError> {
        config.validate()?;
        let bus = EventBus::new(config.event_capacity);
        let breaker = Arc::new(build_breaker(&config, &bus));
        let cache = Arc::new(FallbackCache::new(
            config.cache_freshness(),
            config.vram_total_mb,
        ));
        Ok(Self {
            config,
            collaborators,
            breaker,
            health: Arc::new(ComponentHealthTracker::new()),
            cache,
            bus,
            monitoring: None,
        })
    }

    /// 모니터링 시작. 이미 실행 중이면 경고만 남기고 false
    pub fn start(&mut self) -> bool {
        if self.monitoring.is_some() {
            warn!("모니터링이 이미 실행 중");
            return false;
        }
        self.monitoring = Some(MonitoringLoop::start(LoopDeps {
            config: self.config.clone(),
            collaborators: self.collaborators.clone(),
            breaker: self.breaker.clone(),
            health: self.health.clone(),
            cache: self.cache.clone(),
            bus: self.bus.clone(),
        }));
        true
    }

    /// 모니터링 중단. 실행 중이 아니면 아무것도 하지 않는다
    ///
    /// `timeout` 안에 끝나면 true, 강제 취소했으면 false.
    pub async fn stop(&mut self, timeout: Duration) -> bool {
        match self.monitoring.take() {
            Some(monitoring) => monitoring.stop(timeout).await,
            None => true,
        }
    }

    pub fn pause(&self) -> bool {
        match &self.monitoring {
            Some(monitoring) => monitoring.pause(),
            None => {
                warn!("실행 중이 아니라 일시정지할 수 없음");
                false
            }
        }
    }

    pub fn resume(&self) -> bool {
        match &self.monitoring {
            Some(monitoring) => monitoring.resume(),
            None => {
                warn!("실행 중이 아니라 재개할 수 없음");
                false
            }
        }
    }

    /// 중단 → 브레이커/건강 상태 초기화 → 시작
    pub async fn restart(&mut self) {
        info!("모니터링 재시작");
        self.stop(DEFAULT_STOP_TIMEOUT).await;
        self.breaker.reset();
        self.health.reset();
        self.start();
    }

    /// 설정 교체
    ///
    /// 검증에 실패하면 기존 설정과 루프를 그대로 둔다.
    /// 실행 중이었다면 새 설정으로 재시작한다.
    pub async fn update_config(&mut self, config: WatchdogConfig) -> Result<(), CoreError> {
        config.validate()?;
        let was_running = self.monitoring.is_some();
        if was_running {
            self.stop(DEFAULT_STOP_TIMEOUT).await;
        }

        self.config = config;
        self.breaker = Arc::new(build_breaker(&self.config, &self.bus));
        self.health.reset();
        self.cache
            .configure(self.config.cache_freshness(), self.config.vram_total_mb);
        info!("워치독 설정 교체");

        if was_running {
            self.start();
        }
        Ok(())
    }

    /// 루프 없이 보호된 수집 한 번
    ///
    /// 루프와 같은 브레이커와 캐시를 거치며, 실패하면 대체 스냅샷을 돌려준다.
    pub async fn collect_once(&self) -> SystemMetrics {
        let aggregator = MetricsAggregator::new(
            &self.collaborators,
            &self.config,
            self.health.clone(),
            Instant::now(),
        );
        match self.breaker.execute(|| aggregator.collect()).await {
            Ok(collection) => {
                if collection.is_complete() {
                    self.cache.update(&collection.metrics);
                }
                collection.metrics
            }
            Err(e) => {
                warn!("단발 수집 실패: {e}");
                self.cache
                    .get_or_default(&e.to_string(), aggregator.uptime_seconds())
                    .metrics
            }
        }
    }

    /// 서킷 브레이커, 건강 상태, 캐시 초기화
    pub fn reset(&self) {
        self.breaker.reset();
        self.health.reset();
        self.cache.clear();
    }

    /// 실행 중일 때만 상태 반환
    pub fn get_status(&self) -> Option<WatchdogStatus> {
        self.monitoring.as_ref().map(MonitoringLoop::status)
    }

    pub fn is_running(&self) -> bool {
        self.monitoring.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.monitoring
            .as_ref()
            .is_some_and(MonitoringLoop::is_paused)
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchdogEvent> {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }
}

/// 상태 전환을 `circuit_opened`/`circuit_closed` 이벤트로 옮기는 브레이커 생성
fn build_breaker(config: &WatchdogConfig, bus: &EventBus) -> CircuitBreaker {
    let bus = bus.clone();
    CircuitBreaker::new(config.circuit_breaker.clone()).with_listener(Box::new(
        move |t: &Transition| match t.to {
            CircuitState::Open => bus.publish(WatchdogEvent::CircuitOpened {
                reason: t.reason.clone(),
            }),
            CircuitState::Closed => bus.publish(WatchdogEvent::CircuitClosed),
            CircuitState::HalfOpen => {}
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeHost;
    use resguard_core::models::health::HealthState;

    fn fast_config() -> WatchdogConfig {
        let mut config = WatchdogConfig {
            check_interval_seconds: 0.05,
            health_check_interval_seconds: 0.05,
            ..WatchdogConfig::default()
        };
        config.retry.max_retries = 1;
        config
    }

    #[test]
    fn rejects_invalid_config() {
        let host = FakeHost::new();
        let config = WatchdogConfig {
            check_interval_seconds: 0.0,
            ..WatchdogConfig::default()
        };
        let result = WatchdogController::new(config, host.collaborators());
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[tokio::test]
    async fn status_only_while_running() {
        let host = FakeHost::new();
        let mut controller = WatchdogController::new(fast_config(), host.collaborators()).unwrap();
        assert!(controller.get_status().is_none());

        assert!(controller.start());
        assert!(!controller.start());
        let status = controller.get_status().unwrap();
        assert!(status.running);
        assert!(!status.paused);

        assert!(controller.stop(Duration::from_secs(1)).await);
        assert!(controller.get_status().is_none());
        // 두 번째 stop은 무시
        assert!(controller.stop(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn pause_and_resume_require_running() {
        let host = FakeHost::new();
        let mut controller = WatchdogController::new(fast_config(), host.collaborators()).unwrap();
        assert!(!controller.pause());

        controller.start();
        assert!(controller.pause());
        assert!(!controller.pause());
        assert!(controller.is_paused());
        assert!(controller.get_status().unwrap().paused);
        assert!(controller.resume());
        assert!(!controller.resume());
        controller.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn invalid_update_keeps_previous_config() {
        let host = FakeHost::new();
        let mut controller = WatchdogController::new(fast_config(), host.collaborators()).unwrap();
        let bad = WatchdogConfig {
            vram_threshold_percent: 150.0,
            ..fast_config()
        };
        assert!(controller.update_config(bad).await.is_err());
        assert_eq!(controller.config(), &fast_config());
    }

    #[tokio::test]
    async fn update_while_stopped_does_not_start() {
        let host = FakeHost::new();
        let mut controller = WatchdogController::new(fast_config(), host.collaborators()).unwrap();
        let next = WatchdogConfig {
            max_monitored_processes: 3,
            ..fast_config()
        };
        controller.update_config(next).await.unwrap();
        assert!(!controller.is_running());
        assert_eq!(controller.config().max_monitored_processes, 3);
    }

    #[tokio::test]
    async fn collect_once_falls_back_without_loop() {
        let host = FakeHost::new();
        host.set(|s| s.cpu_percent = 37.0);
        let controller = WatchdogController::new(fast_config(), host.collaborators()).unwrap();

        let metrics = controller.collect_once().await;
        assert_eq!(metrics.cpu_percent, 37.0);
        assert!(!controller.is_running());

        host.fail_all();
        let cached = controller.collect_once().await;
        assert_eq!(cached.cpu_percent, 37.0);
    }

    #[tokio::test]
    async fn reset_clears_health() {
        let host = FakeHost::new();
        let mut controller = WatchdogController::new(fast_config(), host.collaborators()).unwrap();
        controller.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(controller
            .get_status()
            .unwrap()
            .component_health
            .values()
            .all(|h| h.state == HealthState::Healthy));

        controller.reset();
        assert!(controller
            .get_status()
            .unwrap()
            .component_health
            .values()
            .all(|h| h.state == HealthState::Unknown));
        controller.stop(Duration::from_secs(1)).await;
    }
}
