//! 애플리케이션 설정 구조체.
//!
//! 워치독 임계값, 수집 주기, 서킷 브레이커/재시도 정책, 모니터 어댑터 설정을 정의한다.
//! `ConfigManager`를 통해 JSON 파일에서 로드하며, 누락된 필드는 기본값으로 채운다.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 워치독 설정
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// 모니터 어댑터 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self::default()
    }
}

// ============================================================
// 워치독 설정
// ============================================================

/// 워치독 설정
///
/// 한 수집 주기 동안 불변. 교체하면 루프가 재시작된다.
/// 값 범위는 [`WatchdogConfig::validate`]로 검증한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// VRAM 경고 임계값 (%)
    #[serde(default = "default_vram_threshold_percent")]
    pub vram_threshold_percent: f64,
    /// 감시 대상 프로세스 최대 개수
    #[serde(default = "default_max_monitored_processes")]
    pub max_monitored_processes: u32,
    /// 수집 주기 (초)
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: f64,
    /// 프로세스 수 CRITICAL 시 긴급 정리/강제 종료 수행 여부
    #[serde(default)]
    pub self_terminate_on_critical: bool,
    /// 서킷 브레이커 설정
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// 수집기 재시도 설정
    #[serde(default)]
    pub retry: RetryConfig,
    /// 헬스 체크 주기 (초)
    #[serde(default = "default_health_check_interval_seconds")]
    pub health_check_interval_seconds: f64,
    /// 긴급 정리 후 재확인까지 대기 (초)
    #[serde(default = "default_cleanup_grace_seconds")]
    pub cleanup_grace_seconds: f64,
    /// 폴백 캐시 유효 기간 (초)
    #[serde(default = "default_cache_freshness_seconds")]
    pub cache_freshness_seconds: f64,
    /// VRAM 전체 용량 (MB). 장치가 용량을 보고하지 않을 때 사용
    #[serde(default = "default_vram_total_mb")]
    pub vram_total_mb: f64,
    /// 이벤트 버스 채널 용량
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// 서킷 브레이커 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// CLOSED → OPEN 전환 연속 실패 횟수
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// OPEN 유지 시간 (초)
    #[serde(default = "default_recovery_timeout_seconds")]
    pub recovery_timeout_seconds: f64,
    /// HALF_OPEN → CLOSED 전환 연속 성공 횟수
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// 수집기 호출 1회 타임아웃 (초). 0이면 타임아웃 없음
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: f64,
}

/// 재시도 설정 (지수 백오프 + 지터)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 첫 지연 (밀리초)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// 최대 지연 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// 지연 증가 배수
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// 지연의 0~10% 무작위 지터 추가
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            vram_threshold_percent: default_vram_threshold_percent(),
            max_monitored_processes: default_max_monitored_processes(),
            check_interval_seconds: default_check_interval_seconds(),
            self_terminate_on_critical: false,
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            health_check_interval_seconds: default_health_check_interval_seconds(),
            cleanup_grace_seconds: default_cleanup_grace_seconds(),
            cache_freshness_seconds: default_cache_freshness_seconds(),
            vram_total_mb: default_vram_total_mb(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_seconds: default_recovery_timeout_seconds(),
            success_threshold: default_success_threshold(),
            call_timeout_seconds: default_call_timeout_seconds(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter: true,
        }
    }
}

impl WatchdogConfig {
    /// 수집 주기를 Duration으로 반환
    pub fn check_interval(&self) -> Duration {
        secs(self.check_interval_seconds)
    }

    /// 헬스 체크 주기를 Duration으로 반환
    pub fn health_check_interval(&self) -> Duration {
        secs(self.health_check_interval_seconds)
    }

    /// 긴급 정리 유예 시간을 Duration으로 반환
    pub fn cleanup_grace(&self) -> Duration {
        secs(self.cleanup_grace_seconds)
    }

    /// 폴백 캐시 유효 기간을 Duration으로 반환
    pub fn cache_freshness(&self) -> Duration {
        secs(self.cache_freshness_seconds)
    }

    /// 값 범위 검증
    ///
    /// 잘못된 설정으로 워치독을 만들지 않도록 생성 시점에 호출한다.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.vram_threshold_percent > 0.0 && self.vram_threshold_percent <= 100.0) {
            return Err(invalid(
                "vram_threshold_percent",
                "0 초과 100 이하여야 합니다",
            ));
        }
        if self.max_monitored_processes == 0 {
            return Err(invalid("max_monitored_processes", "1 이상이어야 합니다"));
        }
        positive("check_interval_seconds", self.check_interval_seconds)?;
        positive(
            "health_check_interval_seconds",
            self.health_check_interval_seconds,
        )?;
        positive("cache_freshness_seconds", self.cache_freshness_seconds)?;
        positive("vram_total_mb", self.vram_total_mb)?;
        non_negative("cleanup_grace_seconds", self.cleanup_grace_seconds)?;
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity", "1 이상이어야 합니다"));
        }
        self.circuit_breaker.validate()?;
        self.retry.validate()
    }
}

impl CircuitBreakerConfig {
    /// OPEN 유지 시간을 Duration으로 반환
    pub fn recovery_timeout(&self) -> Duration {
        secs(self.recovery_timeout_seconds)
    }

    /// 호출 타임아웃. 0이면 None
    pub fn call_timeout(&self) -> Option<Duration> {
        if self.call_timeout_seconds > 0.0 {
            Some(secs(self.call_timeout_seconds))
        } else {
            None
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.failure_threshold == 0 {
            return Err(invalid(
                "circuit_breaker.failure_threshold",
                "1 이상이어야 합니다",
            ));
        }
        if self.success_threshold == 0 {
            return Err(invalid(
                "circuit_breaker.success_threshold",
                "1 이상이어야 합니다",
            ));
        }
        non_negative(
            "circuit_breaker.recovery_timeout_seconds",
            self.recovery_timeout_seconds,
        )?;
        non_negative(
            "circuit_breaker.call_timeout_seconds",
            self.call_timeout_seconds,
        )
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.max_retries == 0 {
            return Err(invalid("retry.max_retries", "1 이상이어야 합니다"));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(invalid("retry.backoff_factor", "1.0 이상이어야 합니다"));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(invalid(
                "retry.initial_delay_ms",
                "max_delay_ms보다 클 수 없습니다",
            ));
        }
        Ok(())
    }
}

// ============================================================
// 모니터 어댑터 설정
// ============================================================

/// 모니터 어댑터 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 감시 대상으로 볼 프로세스 이름 (정확히 일치)
    #[serde(default)]
    pub monitored_names: Vec<String>,
    /// 호스트 프로세스의 자손을 감시 대상에 포함
    #[serde(default = "default_true")]
    pub include_descendants: bool,
    /// GPU 메모리 조회 활성화 (false면 고정값 0 사용)
    #[serde(default = "default_true")]
    pub gpu_enabled: bool,
    /// VRAM 조회 명령
    #[serde(default = "default_vram_command")]
    pub vram_command: String,
    /// 조회할 GPU 인덱스
    #[serde(default)]
    pub gpu_index: u32,
    /// 강제 종료 시 프로세스 종료 코드
    #[serde(default = "default_shutdown_exit_code")]
    pub shutdown_exit_code: i32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitored_names: Vec::new(),
            include_descendants: true,
            gpu_enabled: true,
            vram_command: default_vram_command(),
            gpu_index: 0,
            shutdown_exit_code: default_shutdown_exit_code(),
        }
    }
}

// ============================================================
// 검증 헬퍼
// ============================================================

fn invalid(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn positive(field: &str, value: f64) -> Result<(), CoreError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "0보다 큰 유한한 값이어야 합니다"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), CoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "0 이상의 유한한 값이어야 합니다"))
    }
}

/// 초 단위 실수를 Duration으로 (음수/NaN은 0)
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_true() -> bool {
    true
}
fn default_vram_threshold_percent() -> f64 {
    90.0
}
fn default_max_monitored_processes() -> u32 {
    10
}
fn default_check_interval_seconds() -> f64 {
    5.0
}
fn default_health_check_interval_seconds() -> f64 {
    30.0
}
fn default_cleanup_grace_seconds() -> f64 {
    2.0
}
fn default_cache_freshness_seconds() -> f64 {
    300.0 // 5분
}
fn default_vram_total_mb() -> f64 {
    8192.0
}
fn default_event_capacity() -> usize {
    256
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_timeout_seconds() -> f64 {
    60.0
}
fn default_success_threshold() -> u32 {
    2
}
fn default_call_timeout_seconds() -> f64 {
    10.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    2_000
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_vram_command() -> String {
    "nvidia-smi".to_string()
}
fn default_shutdown_exit_code() -> i32 {
    1
}
