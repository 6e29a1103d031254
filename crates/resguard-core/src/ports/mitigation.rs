//! 긴급 조치 포트.
//!
//! 구현: `resguard-monitor` crate (sysinfo 기반 프로세스 종료, 프로세스 exit)

use crate::error::CoreError;
use crate::models::metrics::CleanupResult;

/// 초과한 감시 대상 프로세스 정리
pub trait ProcessCleaner: Send + Sync {
    /// `max_allowed`개만 남기고 감시 대상 프로세스를 종료
    fn terminate_excess(&self, max_allowed: u32) -> Result<CleanupResult, CoreError>;
}

/// 전체 강제 종료 (best-effort, 반환값 없음)
pub trait ShutdownHandler: Send + Sync {
    fn force_shutdown(&self, reason: &str);
}
