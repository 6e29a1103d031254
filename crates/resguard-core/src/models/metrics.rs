//! 시스템 메트릭 모델.
//!
//! VRAM, CPU, RAM, 프로세스 수를 하나의 불변 스냅샷으로 표현한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 시스템 메트릭 스냅샷
///
/// 수집 주기마다 한 번 생성되고 이후 변경되지 않는다.
/// 소비자에게는 복제본으로 전달된다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// 수집 시각
    pub timestamp: DateTime<Utc>,
    /// VRAM 사용량 (MB)
    pub vram_used_mb: f64,
    /// VRAM 전체 용량 (MB)
    pub vram_total_mb: f64,
    /// VRAM 사용률 (0.0 ~ 100.0)
    pub vram_percent: f64,
    /// CPU 사용률 (0.0 ~ 100.0)
    pub cpu_percent: f64,
    /// RAM 사용량 (MB)
    pub ram_used_mb: f64,
    /// RAM 사용률 (0.0 ~ 100.0)
    pub ram_percent: f64,
    /// 전체 프로세스 수
    pub process_count: u32,
    /// 감시 대상 프로세스 수
    pub monitored_process_count: u32,
    /// 워치독 시작 후 경과 시간 (초)
    pub uptime_seconds: f64,
}

impl SystemMetrics {
    /// 모든 값이 안전 기본값인 스냅샷
    pub fn defaults(vram_total_mb: f64, uptime_seconds: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            vram_used_mb: 0.0,
            vram_total_mb,
            vram_percent: 0.0,
            cpu_percent: 0.0,
            ram_used_mb: 0.0,
            ram_percent: 0.0,
            process_count: 0,
            monitored_process_count: 0,
            uptime_seconds,
        }
    }

    /// 가동 시간만 갱신한 복제본
    pub fn with_uptime(&self, uptime_seconds: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            uptime_seconds,
            ..self.clone()
        }
    }
}

/// 사용량/전체 용량으로 백분율 계산 (전체가 0이면 0)
pub fn percent_of(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        (used / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// VRAM 수집 결과
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VramReading {
    /// 사용량 (MB)
    pub used_mb: f64,
    /// 장치가 보고한 전체 용량 (MB). 없으면 설정값 사용
    pub total_mb: Option<f64>,
}

/// RAM 수집 결과
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RamReading {
    /// 사용량 (MB)
    pub used_mb: f64,
    /// 사용률 (0.0 ~ 100.0)
    pub percent: f64,
}

/// 프로세스 수 수집 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCounts {
    /// 시스템 전체 프로세스 수
    pub total: u32,
    /// 호스트 애플리케이션 소속 프로세스 수
    pub monitored: u32,
}

/// 긴급 정리 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    /// 종료된 프로세스 수
    pub terminated: u32,
    /// 종료 실패한 프로세스 수
    pub failed: u32,
}
