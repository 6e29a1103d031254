//! 임계값 평가.
//!
//! 스냅샷 하나와 설정만으로 알림 목록을 만드는 순수 함수.
//! 평가 순서: VRAM → 감시 대상 프로세스 수 → RAM → CPU.
//! 모든 비교는 초과(`>`) 기준이다.

use resguard_core::config::WatchdogConfig;
use resguard_core::models::alert::{Alert, AlertKind, AlertLevel};
use resguard_core::models::metrics::SystemMetrics;

/// RAM CRITICAL 기준 (%)
pub const RAM_CRITICAL_PERCENT: f64 = 95.0;
/// RAM WARNING 기준 (%)
pub const RAM_WARNING_PERCENT: f64 = 90.0;
/// CPU WARNING 기준 (%)
pub const CPU_WARNING_PERCENT: f64 = 80.0;

/// 스냅샷을 평가해 알림 목록 반환
pub fn evaluate(metrics: &SystemMetrics, config: &WatchdogConfig) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut push = |level, kind, message: String| {
        alerts.push(Alert {
            level,
            kind,
            message,
            metrics: metrics.clone(),
        })
    };

    if metrics.vram_percent > config.vram_threshold_percent {
        push(
            AlertLevel::Warning,
            AlertKind::Vram,
            format!(
                "VRAM 사용률 높음: {:.1}% (임계값 {:.1}%)",
                metrics.vram_percent, config.vram_threshold_percent
            ),
        );
    }

    if metrics.monitored_process_count > config.max_monitored_processes {
        push(
            AlertLevel::Critical,
            AlertKind::ProcessCount,
            format!(
                "감시 대상 프로세스 과다: {}개 (최대 {}개)",
                metrics.monitored_process_count, config.max_monitored_processes
            ),
        );
    }

    if metrics.ram_percent > RAM_CRITICAL_PERCENT {
        push(
            AlertLevel::Critical,
            AlertKind::Ram,
            format!("RAM 사용률 위험: {:.1}%", metrics.ram_percent),
        );
    } else if metrics.ram_percent > RAM_WARNING_PERCENT {
        push(
            AlertLevel::Warning,
            AlertKind::Ram,
            format!("RAM 사용률 높음: {:.1}%", metrics.ram_percent),
        );
    }

    if metrics.cpu_percent > CPU_WARNING_PERCENT {
        push(
            AlertLevel::Warning,
            AlertKind::Cpu,
            format!("CPU 사용률 높음: {:.1}%", metrics.cpu_percent),
        );
    }

    alerts
}

/// 긴급 조치 대상인 프로세스 수 CRITICAL 알림이 있는지
pub fn has_process_critical(alerts: &[Alert]) -> bool {
    alerts
        .iter()
        .any(|a| a.kind == AlertKind::ProcessCount && a.level == AlertLevel::Critical)
}
