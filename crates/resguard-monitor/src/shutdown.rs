//! 강제 종료 핸들러.
//!
//! `ShutdownHandler` 포트 구현. 감시 대상 프로세스를 모두 종료한 뒤
//! 호스트 프로세스를 종료한다. 워치독에서 호스트를 끝낼 수 있는 유일한 경로.

use resguard_core::ports::mitigation::ShutdownHandler;
use std::sync::Arc;
use tracing::{error, warn};

use crate::process::ProcessTracker;

/// 프로세스 exit 기반 강제 종료
pub struct ExitShutdownHandler {
    tracker: Arc<ProcessTracker>,
    exit_code: i32,
}

impl ExitShutdownHandler {
    pub fn new(tracker: Arc<ProcessTracker>, exit_code: i32) -> Self {
        Self { tracker, exit_code }
    }
}

impl ShutdownHandler for ExitShutdownHandler {
    fn force_shutdown(&self, reason: &str) {
        error!("강제 종료: {reason}");
        match self.tracker.terminate_all() {
            Ok(result) if result.failed > 0 => {
                warn!("감시 대상 {}개 종료 실패", result.failed)
            }
            Ok(_) => {}
            Err(e) => warn!("감시 대상 종료 실패: {e}"),
        }
        std::process::exit(self.exit_code);
    }
}
