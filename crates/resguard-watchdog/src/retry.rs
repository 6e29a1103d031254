//! 지수 백오프 재시도.
//!
//! 수집기 호출 하나를 최대 `max_retries`회 시도한다.
//! n번째 시도(n ≥ 2) 전 지연은 `min(max_delay, initial × factor^(n-1))`이고,
//! 지터가 켜져 있으면 0~10%를 더한 뒤 다시 `max_delay`로 자른다.

use resguard_core::config::RetryConfig;
use resguard_core::error::CoreError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// 지터 최대 비율
const JITTER_RATIO: f64 = 0.1;

/// 진행 중인 재시도 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 방금 끝난 시도 번호 (1부터)
    pub attempt: u32,
    /// 다음 시도 전 대기 시간
    pub next_delay: Duration,
}

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// `attempt`번째 시도 전 기본 지연 (지터 제외)
    ///
    /// 첫 시도는 지연이 없다.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let initial_ms = self.config.initial_delay_ms as f64;
        let max_ms = self.config.max_delay_ms as f64;
        let delay_ms = (initial_ms * self.config.backoff_factor.powi(exponent)).min(max_ms);
        Duration::from_secs_f64(delay_ms.max(0.0) / 1000.0)
    }

    /// 지터를 적용한 실제 대기 시간
    fn sleep_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if !self.config.jitter || base.is_zero() {
            return base;
        }
        let jitter = base.mul_f64(JITTER_RATIO * rand::random::<f64>());
        (base + jitter).min(self.config.max_delay())
    }

    /// 재시도하며 연산 실행
    ///
    /// 영구 에러(`CoreError::is_permanent`)는 즉시 반환한다.
    /// 모든 시도가 실패하면 마지막 에러를 반환한다.
    pub async fn with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("재시도 성공 (시도 {attempt}/{max_attempts})");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_permanent() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let state = RetryState {
                        attempt,
                        next_delay: self.sleep_for_attempt(attempt + 1),
                    };
                    warn!(
                        "호출 실패 (시도 {}/{max_attempts}): {e}, {:?} 후 재시도",
                        state.attempt, state.next_delay
                    );
                    tokio::time::sleep(state.next_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
