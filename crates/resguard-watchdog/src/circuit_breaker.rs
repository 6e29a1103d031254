//! 서킷 브레이커.
//!
//! CLOSED → (연속 실패 `failure_threshold`회) → OPEN
//! → (`recovery_timeout` 경과 후 첫 호출) → HALF_OPEN
//! → (연속 성공 `success_threshold`회) → CLOSED.
//! HALF_OPEN에서 실패하면 곧바로 OPEN으로 돌아간다.
//!
//! 상태는 `parking_lot::Mutex` 하나로 보호하며 await 지점을 넘겨 잡지 않는다.
//! 시간은 `tokio::time::Instant` 기준이라 일시정지된 테스트 시계에서도 동작한다.

use parking_lot::Mutex;
use resguard_core::config::CircuitBreakerConfig;
use resguard_core::error::CoreError;
use resguard_core::models::status::CircuitState;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// 상태 전환 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    /// 전환 사유 (OPEN 전환 시 마지막 실패 메시지)
    pub reason: String,
}

/// 상태 전환 알림 콜백
pub type TransitionListener = Box<dyn Fn(&Transition) + Send + Sync>;

/// 서킷 브레이커 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// 실행된 호출 수
    pub total_calls: u64,
    /// OPEN 상태에서 거부된 호출 수
    pub rejected_calls: u64,
    /// OPEN 전환 횟수
    pub times_opened: u64,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    total_calls: u64,
    rejected_calls: u64,
    times_opened: u64,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState, reason: impl Into<String>) -> Transition {
        let from = self.state;
        self.state = to;
        self.success_count = 0;
        match to {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::Open => self.times_opened += 1,
            CircuitState::HalfOpen => {}
        }
        Transition {
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// 서킷 브레이커
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    listener: Option<TransitionListener>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner::default()),
            listener: None,
        }
    }

    /// 상태 전환마다 호출될 콜백 등록
    pub fn with_listener(mut self, listener: TransitionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// OPEN이고 복구 대기 시간이 지나 다음 호출이 시험 호출이 되는지
    pub fn ready_for_trial(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == CircuitState::Open && self.remaining_open(&inner).is_zero()
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
            times_opened: inner.times_opened,
        }
    }

    /// CLOSED로 강제 복귀, 카운터 초기화
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            *inner = BreakerInner::default();
            (previous != CircuitState::Closed).then(|| Transition {
                from: previous,
                to: CircuitState::Closed,
                reason: "수동 초기화".to_string(),
            })
        };
        if let Some(t) = transition {
            info!("서킷 브레이커 초기화: {} → CLOSED", t.from);
            self.notify(&t);
        }
    }

    /// 브레이커를 거쳐 연산 실행
    ///
    /// OPEN이고 복구 대기 중이면 연산을 호출하지 않고 `CircuitOpen`을 반환한다.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.admit()?;
        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&e);
                Err(e)
            }
        }
    }

    fn remaining_open(&self, inner: &BreakerInner) -> Duration {
        let elapsed = inner
            .last_failure_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::MAX);
        self.config.recovery_timeout().saturating_sub(elapsed)
    }

    fn admit(&self) -> Result<(), CoreError> {
        let transition = {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::Open {
                let remaining = self.remaining_open(&inner);
                if !remaining.is_zero() {
                    inner.rejected_calls += 1;
                    return Err(CoreError::CircuitOpen {
                        retry_in_ms: remaining.as_millis().try_into().unwrap_or(u64::MAX),
                    });
                }
                inner.total_calls += 1;
                Some(inner.transition(CircuitState::HalfOpen, "복구 대기 시간 경과"))
            } else {
                inner.total_calls += 1;
                None
            }
        };
        if let Some(t) = transition {
            info!("서킷 브레이커 HALF_OPEN: 시험 호출 허용");
            self.notify(&t);
        }
        Ok(())
    }

    fn on_success(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            match inner.state {
                CircuitState::HalfOpen => {
                    inner.success_count += 1;
                    (inner.success_count >= self.config.success_threshold)
                        .then(|| inner.transition(CircuitState::Closed, "시험 호출 성공"))
                }
                _ => {
                    inner.failure_count = 0;
                    None
                }
            }
        };
        if let Some(t) = transition {
            info!("서킷 브레이커 CLOSED: 정상 복구");
            self.notify(&t);
        }
    }

    fn on_failure(&self, error: &CoreError) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.failure_count += 1;
            inner.last_failure_at = Some(Instant::now());
            match inner.state {
                CircuitState::HalfOpen => {
                    Some(inner.transition(CircuitState::Open, error.to_string()))
                }
                CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                    Some(inner.transition(CircuitState::Open, error.to_string()))
                }
                _ => None,
            }
        };
        if let Some(t) = transition {
            warn!(
                "서킷 브레이커 OPEN ({} → OPEN): {}, {:?} 동안 호출 차단",
                t.from,
                t.reason,
                self.config.recovery_timeout()
            );
            self.notify(&t);
        }
    }

    fn notify(&self, transition: &Transition) {
        if let Some(listener) = &self.listener {
            listener(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config(failure_threshold: u32, recovery_secs: f64, success_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout_seconds: recovery_secs,
            success_threshold,
            call_timeout_seconds: 0.0,
        }
    }

    fn recording(config: CircuitBreakerConfig) -> (CircuitBreaker, Arc<Mutex<Vec<Transition>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let breaker = CircuitBreaker::new(config)
            .with_listener(Box::new(move |t: &Transition| sink.lock().push(t.clone())));
        (breaker, log)
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), CoreError> {
        breaker
            .execute(|| async { Err(CoreError::Internal("수집 실패".to_string())) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), CoreError> {
        breaker.execute(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn opens_exactly_once_and_rejects_without_calling() {
        let (breaker, log) = recording(config(3, 60.0, 1));
        for _ in 0..3 {
            assert!(fail(&breaker).await.is_err());
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        for _ in 0..5 {
            let result = breaker
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert_matches!(result, Err(CoreError::CircuitOpen { .. }));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from, CircuitState::Closed);
        assert_eq!(log[0].to, CircuitState::Open);
        assert_eq!(breaker.metrics().rejected_calls, 5);
        assert_eq!(breaker.metrics().times_opened, 1);
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let (breaker, _) = recording(config(3, 60.0, 1));
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        succeed(&breaker).await.unwrap();
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_after_recovery_timeout_closes() {
        let (breaker, log) = recording(config(2, 10.0, 1));
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert!(breaker.is_open());
        assert!(!breaker.ready_for_trial());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(breaker.ready_for_trial());

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);

        let states: Vec<_> = log.lock().iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![CircuitState::Open, CircuitState::HalfOpen, CircuitState::Closed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let (breaker, _) = recording(config(1, 5.0, 2));
        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(6)).await;

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_matches!(succeed(&breaker).await, Err(CoreError::CircuitOpen { .. }));
        assert_eq!(breaker.metrics().times_opened, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn needs_consecutive_successes_to_close() {
        let (breaker, _) = recording(config(1, 1.0, 3));
        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(2)).await;

        succeed(&breaker).await.unwrap();
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn rejection_reports_remaining_time() {
        let (breaker, _) = recording(config(1, 30.0, 1));
        fail(&breaker).await.unwrap_err();
        match succeed(&breaker).await {
            Err(CoreError::CircuitOpen { retry_in_ms }) => {
                assert!(retry_in_ms > 29_000 && retry_in_ms <= 30_000)
            }
            other => panic!("CircuitOpen 기대, 실제: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_closes_and_notifies() {
        let (breaker, log) = recording(config(1, 60.0, 1));
        fail(&breaker).await.unwrap_err();
        breaker.reset();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics(), CircuitBreakerMetrics::default());
        assert_eq!(log.lock().last().map(|t| t.to), Some(CircuitState::Closed));
        succeed(&breaker).await.unwrap();
    }
}
