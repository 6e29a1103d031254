//! 컴포넌트 건강 상태 모델.
//!
//! 수집기(vram, cpu, ram, process_count)마다 하나씩 존재하며
//! 수집 시도 후 매번 갱신된다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 연속 실패가 이 횟수에 도달하면 `Failed`로 본다
pub const FAILED_AFTER_CONSECUTIVE: u32 = 3;

/// 메트릭 수집기 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Vram,
    Cpu,
    Ram,
    ProcessCount,
}

impl Component {
    /// 수집 순서대로 나열한 전체 목록
    pub const ALL: [Component; 4] = [
        Component::Vram,
        Component::Cpu,
        Component::Ram,
        Component::ProcessCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Vram => "vram",
            Component::Cpu => "cpu",
            Component::Ram => "ram",
            Component::ProcessCount => "process_count",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 컴포넌트 건강 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Failed,
    /// 서킷 브레이커 시험 호출 중
    Recovering,
    /// 아직 한 번도 수집하지 않음
    #[default]
    Unknown,
}

/// 수집기별 건강 기록
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub state: HealthState,
    /// 마지막 성공 시각
    pub last_success_time: Option<DateTime<Utc>>,
    /// 연속 실패 횟수
    pub consecutive_failures: u32,
    /// 복구 횟수 (실패 후 첫 성공 또는 시험 호출 진입마다 1)
    pub recovery_attempts: u32,
    /// 마지막 실패 사유
    pub message: Option<String>,
}

/// 헬스 체크 이벤트로 전달되는 요약
pub type HealthSummary = ComponentHealth;

/// 컴포넌트별 건강 상태 맵
pub type HealthMap = BTreeMap<Component, HealthSummary>;

impl ComponentHealth {
    /// 수집 성공 기록
    ///
    /// 시험 호출(`Recovering`)에서 이미 센 복구는 다시 세지 않는다.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        if self.consecutive_failures > 0 && self.state != HealthState::Recovering {
            self.recovery_attempts += 1;
        }
        self.state = HealthState::Healthy;
        self.consecutive_failures = 0;
        self.last_success_time = Some(now);
        self.message = None;
    }

    /// 수집 실패 기록
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.consecutive_failures += 1;
        self.state = if self.consecutive_failures >= FAILED_AFTER_CONSECUTIVE {
            HealthState::Failed
        } else {
            HealthState::Degraded
        };
        self.message = Some(message.into());
    }

    /// 시험 호출 진입: 비정상 컴포넌트만 `Recovering`으로 전환
    pub fn begin_recovery(&mut self) {
        if matches!(self.state, HealthState::Degraded | HealthState::Failed) {
            self.state = HealthState::Recovering;
            self.recovery_attempts += 1;
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_escalates_to_failed() {
        let mut health = ComponentHealth::default();
        assert_eq!(health.state, HealthState::Unknown);

        health.record_failure("타임아웃");
        assert_eq!(health.state, HealthState::Degraded);
        health.record_failure("타임아웃");
        assert_eq!(health.state, HealthState::Degraded);
        health.record_failure("타임아웃");
        assert_eq!(health.state, HealthState::Failed);
        assert_eq!(health.consecutive_failures, 3);
        assert_eq!(health.message.as_deref(), Some("타임아웃"));
    }

    #[test]
    fn success_after_failure_counts_recovery() {
        let mut health = ComponentHealth::default();
        health.record_failure("x");
        health.record_success(Utc::now());

        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.recovery_attempts, 1);
        assert!(health.message.is_none());
        assert!(health.last_success_time.is_some());
    }

    #[test]
    fn trial_recovery_is_counted_once() {
        let mut health = ComponentHealth::default();
        health.record_failure("x");
        health.record_failure("x");
        health.begin_recovery();
        assert_eq!(health.state, HealthState::Recovering);
        assert_eq!(health.recovery_attempts, 1);

        health.record_success(Utc::now());
        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.recovery_attempts, 1);

        health.record_failure("x");
        health.begin_recovery();
        health.record_failure("x");
        assert_eq!(health.state, HealthState::Degraded);
        health.record_success(Utc::now());
        assert_eq!(health.recovery_attempts, 3);
    }

    #[test]
    fn begin_recovery_skips_healthy() {
        let mut healthy = ComponentHealth::default();
        healthy.record_success(Utc::now());
        healthy.begin_recovery();
        assert_eq!(healthy.state, HealthState::Healthy);

        let mut degraded = ComponentHealth::default();
        degraded.record_failure("x");
        degraded.begin_recovery();
        assert_eq!(degraded.state, HealthState::Recovering);
        assert_eq!(degraded.recovery_attempts, 1);
    }
}
