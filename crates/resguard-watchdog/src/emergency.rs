//! 긴급 조치 조정기.
//!
//! 감시 대상 프로세스 수가 한도를 넘고 `self_terminate_on_critical`이 켜져 있을 때:
//! 1. `cleanup_started` 발행 후 초과분 정리 요청
//! 2. `cleanup_completed` 발행 (정리 실패 시 `error_occurred`도 발행)
//! 3. 유예 시간 대기 후 프로세스 수 재확인
//! 4. 여전히 초과면 `emergency_shutdown_initiated` 발행 후 강제 종료 요청

use resguard_core::models::event::WatchdogEvent;
use resguard_core::models::metrics::CleanupResult;
use resguard_core::ports::mitigation::{ProcessCleaner, ShutdownHandler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::aggregator::MetricsAggregator;
use crate::event_bus::EventBus;
use crate::guard::CallGuard;

/// 긴급 조치 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmergencyOutcome {
    /// 정리 후 한도 이내로 내려옴
    Resolved { remaining: u32 },
    /// 강제 종료 요청함
    Escalated { reason: String },
}

/// 긴급 조치 조정기
pub struct EmergencyCoordinator {
    cleaner: Arc<dyn ProcessCleaner>,
    shutdown: Arc<dyn ShutdownHandler>,
    guard: CallGuard,
    bus: EventBus,
    max_allowed: u32,
    grace: Duration,
}

impl EmergencyCoordinator {
    pub fn new(
        cleaner: Arc<dyn ProcessCleaner>,
        shutdown: Arc<dyn ShutdownHandler>,
        guard: CallGuard,
        bus: EventBus,
        max_allowed: u32,
        grace: Duration,
    ) -> Self {
        Self {
            cleaner,
            shutdown,
            guard,
            bus,
            max_allowed,
            grace,
        }
    }

    /// 긴급 조치 실행
    pub async fn handle(&self, count: u32, aggregator: &MetricsAggregator) -> EmergencyOutcome {
        warn!(
            "감시 대상 프로세스 {count}개 (최대 {}개), 긴급 정리 시작",
            self.max_allowed
        );
        self.bus.publish(WatchdogEvent::CleanupStarted { count });

        let result = self.cleanup(count).await;
        info!(
            "긴급 정리 완료: 종료 {}개, 실패 {}개",
            result.terminated, result.failed
        );
        self.bus.publish(WatchdogEvent::CleanupCompleted { result });

        tokio::time::sleep(self.grace).await;

        let reason = match aggregator.read_process_counts().await {
            Ok(counts) if counts.monitored <= self.max_allowed => {
                info!("정리 후 감시 대상 {}개, 정상 범위", counts.monitored);
                return EmergencyOutcome::Resolved {
                    remaining: counts.monitored,
                };
            }
            Ok(counts) => format!(
                "정리 후에도 감시 대상 프로세스 {}개 (최대 {}개)",
                counts.monitored, self.max_allowed
            ),
            Err(e) => format!("정리 후 프로세스 수 재확인 실패: {e}"),
        };

        error!("긴급 종료 시작: {reason}");
        self.bus.publish(WatchdogEvent::EmergencyShutdownInitiated {
            reason: reason.clone(),
        });
        self.request_shutdown(&reason).await;
        EmergencyOutcome::Escalated { reason }
    }

    async fn cleanup(&self, count: u32) -> CleanupResult {
        let cleaner = self.cleaner.clone();
        let max_allowed = self.max_allowed;
        match self
            .guard
            .call(move || cleaner.terminate_excess(max_allowed))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("긴급 정리 실패: {e}");
                self.bus.publish(WatchdogEvent::ErrorOccurred {
                    message: format!("긴급 정리 실패: {e}"),
                });
                CleanupResult {
                    terminated: 0,
                    failed: count.saturating_sub(max_allowed),
                }
            }
        }
    }

    async fn request_shutdown(&self, reason: &str) {
        let shutdown = self.shutdown.clone();
        let reason = reason.to_string();
        let call = self.guard.call(move || {
            shutdown.force_shutdown(&reason);
            Ok(())
        });
        if let Err(e) = call.await {
            error!("강제 종료 요청 실패: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentHealthTracker;
    use crate::test_support::FakeHost;
    use resguard_core::config::WatchdogConfig;
    use resguard_core::models::health::Component;
    use tokio::sync::broadcast::Receiver;
    use tokio::time::Instant;

    fn setup(host: &Arc<FakeHost>) -> (EmergencyCoordinator, MetricsAggregator, Receiver<WatchdogEvent>) {
        let bus = EventBus::new(64);
        let rx = bus.subscribe();
        let collaborators = host.collaborators();
        let mut config = WatchdogConfig::default();
        config.retry.max_retries = 1;
        let aggregator = MetricsAggregator::new(
            &collaborators,
            &config,
            Arc::new(ComponentHealthTracker::new()),
            Instant::now(),
        );
        let coordinator = EmergencyCoordinator::new(
            collaborators.cleaner.clone(),
            collaborators.shutdown.clone(),
            CallGuard::new(Some(Duration::from_secs(1))),
            bus,
            5,
            Duration::from_millis(10),
        );
        (coordinator, aggregator, rx)
    }

    fn drain(rx: &mut Receiver<WatchdogEvent>) -> Vec<WatchdogEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn cleanup_within_limit_resolves() {
        let host = FakeHost::new();
        host.set(|s| s.monitored = 6);
        let (coordinator, aggregator, mut rx) = setup(&host);

        let outcome = coordinator.handle(6, &aggregator).await;
        assert_eq!(outcome, EmergencyOutcome::Resolved { remaining: 5 });

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WatchdogEvent::CleanupStarted { count: 6 }));
        assert!(matches!(
            events[1],
            WatchdogEvent::CleanupCompleted {
                result: CleanupResult {
                    terminated: 1,
                    failed: 0
                }
            }
        ));
        assert_eq!(host.cleanup_calls(), vec![5]);
        assert!(host.shutdown_reasons().is_empty());
    }

    #[tokio::test]
    async fn still_over_limit_escalates() {
        let host = FakeHost::new();
        host.set(|s| {
            s.monitored = 8;
            s.after_cleanup = Some(7);
        });
        let (coordinator, aggregator, mut rx) = setup(&host);

        let outcome = coordinator.handle(8, &aggregator).await;
        assert!(matches!(outcome, EmergencyOutcome::Escalated { .. }));

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "cleanup_started",
                "cleanup_completed",
                "emergency_shutdown_initiated"
            ]
        );
        let reasons = host.shutdown_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("7개"));
    }

    #[tokio::test]
    async fn cleaner_failure_reports_and_escalates() {
        let host = FakeHost::new();
        host.set(|s| {
            s.monitored = 9;
            s.cleanup_fails = true;
        });
        let (coordinator, aggregator, mut rx) = setup(&host);

        coordinator.handle(9, &aggregator).await;

        let events = drain(&mut rx);
        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "cleanup_started",
                "error_occurred",
                "cleanup_completed",
                "emergency_shutdown_initiated"
            ]
        );
        assert!(matches!(
            events[2],
            WatchdogEvent::CleanupCompleted {
                result: CleanupResult {
                    terminated: 0,
                    failed: 4
                }
            }
        ));
        assert_eq!(host.shutdown_reasons().len(), 1);
    }

    #[tokio::test]
    async fn failed_recheck_escalates() {
        let host = FakeHost::new();
        host.set(|s| s.monitored = 6);
        let (coordinator, aggregator, _rx) = setup(&host);
        host.fail(Component::ProcessCount);

        let outcome = coordinator.handle(6, &aggregator).await;
        match outcome {
            EmergencyOutcome::Escalated { reason } => assert!(reason.contains("재확인 실패")),
            other => panic!("Escalated 기대, 실제: {other:?}"),
        }
    }
}
