//! 블로킹 수집기 호출 보호.
//!
//! 포트 구현은 동기 함수라서 `spawn_blocking`으로 옮겨 실행하고
//! `call_timeout`을 넘기면 `CoreError::Timeout`으로 끊는다.
//! 시간 초과된 호출은 백그라운드에서 끝날 때까지 방치된다.

use resguard_core::error::CoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 타임아웃이 걸린 블로킹 호출 래퍼
#[derive(Debug, Clone, Copy, Default)]
pub struct CallGuard {
    timeout: Option<Duration>,
}

impl CallGuard {
    /// `None`이면 타임아웃 없이 완료를 기다린다
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 블로킹 함수를 별도 스레드에서 실행
    ///
    /// 함수가 패닉하면 `CoreError::Internal`로 변환한다.
    pub fn call<T, F>(&self, f: F) -> impl Future<Output = Result<T, CoreError>> + Send + 'static
    where
        F: FnOnce() -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.timeout;
        async move {
            let handle = tokio::task::spawn_blocking(f);
            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("호출 타임아웃: {limit:?} 초과");
                        return Err(CoreError::Timeout {
                            timeout_ms: limit.as_millis().try_into().unwrap_or(u64::MAX),
                        });
                    }
                },
                None => handle.await,
            };
            joined.map_err(|e| CoreError::Internal(format!("블로킹 작업 실패: {e}")))?
        }
    }
}
