//! 워치독 이벤트 모델.
//!
//! 워치독은 호출자에게 에러를 돌려주지 않고 모든 결과를 이벤트로 발행한다.
//! 한 수집 주기 안의 발행 순서는 수집 → 평가 → 긴급 조치 → 상태 순이다.

use serde::{Deserialize, Serialize};

use super::alert::AlertLevel;
use super::health::HealthMap;
use super::metrics::{CleanupResult, SystemMetrics};
use super::status::WatchdogStatus;

/// 워치독이 발행하는 모든 이벤트의 통합 enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchdogEvent {
    /// 실시간 수집 성공
    MetricsReady { metrics: SystemMetrics },
    /// 캐시/기본값으로 대체된 메트릭
    MetricsDegraded {
        metrics: SystemMetrics,
        reason: String,
    },
    /// 임계값 초과
    AlertTriggered { level: AlertLevel, message: String },
    /// 수집 또는 루프 에러
    ErrorOccurred { message: String },
    /// 실패 이후 첫 정상 수집
    ErrorRecovered { message: String },
    /// 서킷 브레이커 차단 전환
    CircuitOpened { reason: String },
    /// 서킷 브레이커 정상 복귀
    CircuitClosed,
    /// 주기 종료 시점 상태
    StatusChanged { status: WatchdogStatus },
    /// 헬스 체크 완료
    HealthCheckCompleted { health: HealthMap },
    /// 긴급 정리 시작
    CleanupStarted { count: u32 },
    /// 긴급 정리 완료
    CleanupCompleted { result: CleanupResult },
    /// 강제 종료 시작
    EmergencyShutdownInitiated { reason: String },
    MonitoringStarted,
    MonitoringStopped,
    MonitoringPaused,
    MonitoringResumed,
}

impl WatchdogEvent {
    /// 로그/구독 필터용 이벤트 이름
    pub fn name(&self) -> &'static str {
        match self {
            WatchdogEvent::MetricsReady { .. } => "metrics_ready",
            WatchdogEvent::MetricsDegraded { .. } => "metrics_degraded",
            WatchdogEvent::AlertTriggered { .. } => "alert_triggered",
            WatchdogEvent::ErrorOccurred { .. } => "error_occurred",
            WatchdogEvent::ErrorRecovered { .. } => "error_recovered",
            WatchdogEvent::CircuitOpened { .. } => "circuit_opened",
            WatchdogEvent::CircuitClosed => "circuit_closed",
            WatchdogEvent::StatusChanged { .. } => "status_changed",
            WatchdogEvent::HealthCheckCompleted { .. } => "health_check_completed",
            WatchdogEvent::CleanupStarted { .. } => "cleanup_started",
            WatchdogEvent::CleanupCompleted { .. } => "cleanup_completed",
            WatchdogEvent::EmergencyShutdownInitiated { .. } => "emergency_shutdown_initiated",
            WatchdogEvent::MonitoringStarted => "monitoring_started",
            WatchdogEvent::MonitoringStopped => "monitoring_stopped",
            WatchdogEvent::MonitoringPaused => "monitoring_paused",
            WatchdogEvent::MonitoringResumed => "monitoring_resumed",
        }
    }
}
