//! 워치독 상태 조회 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::health::HealthMap;

/// 서킷 브레이커 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// 정상: 호출 통과
    #[default]
    Closed,
    /// 차단: 호출 즉시 거부
    Open,
    /// 시험: 제한적으로 호출 허용
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// 외부 상태 조회용 읽기 전용 스냅샷
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchdogStatus {
    pub running: bool,
    pub paused: bool,
    /// 마지막 수집 주기 완료 시각
    pub last_check_time: Option<DateTime<Utc>>,
    pub circuit_state: CircuitState,
    pub component_health: HealthMap,
    /// 폴백 캐시 나이 (초). 캐시가 비어 있으면 None
    pub cache_age_seconds: Option<f64>,
    /// 완료된 수집 주기 수
    pub total_checks: u64,
    /// 누적 에러 수
    pub error_count: u64,
    /// 루프 시작 후 경과 시간 (초)
    pub uptime_seconds: f64,
}
