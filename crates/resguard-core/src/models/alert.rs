//! 임계값 알림 모델.

use serde::{Deserialize, Serialize};

use super::metrics::SystemMetrics;

/// 알림 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// 알림을 일으킨 리소스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Vram,
    ProcessCount,
    Ram,
    Cpu,
}

/// 임계값 초과 알림
///
/// 워치독은 보관하지 않는다. 이벤트 버스로 발행하고 끝.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub kind: AlertKind,
    pub message: String,
    /// 알림 시점의 메트릭
    pub metrics: SystemMetrics,
}
