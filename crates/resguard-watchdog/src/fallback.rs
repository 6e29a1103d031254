//! 폴백 캐시.
//!
//! 마지막으로 완전히 성공한 스냅샷을 보관한다. 수집이 실패하거나
//! 서킷이 열려 있으면 유효 기간 안의 캐시를, 지났으면 안전 기본값을 돌려준다.

use parking_lot::Mutex;
use resguard_core::models::metrics::SystemMetrics;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// 성능 저하 스냅샷의 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedSource {
    /// 유효 기간 내 캐시
    Cache,
    /// 캐시 없음 또는 만료
    Defaults,
}

/// 대체 스냅샷
#[derive(Debug, Clone)]
pub struct DegradedMetrics {
    pub metrics: SystemMetrics,
    /// `metrics_degraded` 이벤트에 실을 사유
    pub reason: String,
    pub source: DegradedSource,
}

struct CacheInner {
    snapshot: Option<(SystemMetrics, Instant)>,
    freshness: Duration,
    vram_total_mb: f64,
}

/// 폴백 캐시
pub struct FallbackCache {
    inner: Mutex<CacheInner>,
}

impl FallbackCache {
    pub fn new(freshness: Duration, vram_total_mb: f64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                snapshot: None,
                freshness,
                vram_total_mb,
            }),
        }
    }

    /// 설정 교체 시 유효 기간과 기본 VRAM 용량 갱신 (보관 중인 스냅샷은 유지)
    pub fn configure(&self, freshness: Duration, vram_total_mb: f64) {
        let mut inner = self.inner.lock();
        inner.freshness = freshness;
        inner.vram_total_mb = vram_total_mb;
    }

    /// 완전히 성공한 스냅샷 저장
    pub fn update(&self, metrics: &SystemMetrics) {
        self.inner.lock().snapshot = Some((metrics.clone(), Instant::now()));
    }

    /// 마지막 저장 이후 경과 시간
    pub fn age(&self) -> Option<Duration> {
        self.inner
            .lock()
            .snapshot
            .as_ref()
            .map(|(_, stored_at)| stored_at.elapsed())
    }

    /// 캐시 또는 기본값으로 대체 스냅샷 생성
    ///
    /// `uptime_seconds`는 현재 가동 시간으로 덮어쓴다.
    pub fn get_or_default(&self, error_reason: &str, uptime_seconds: f64) -> DegradedMetrics {
        let inner = self.inner.lock();
        match &inner.snapshot {
            Some((metrics, stored_at)) if stored_at.elapsed() <= inner.freshness => {
                let age = stored_at.elapsed().as_secs_f64();
                debug!("캐시된 메트릭 사용 ({age:.1}초 전)");
                DegradedMetrics {
                    metrics: metrics.with_uptime(uptime_seconds),
                    reason: format!("캐시된 메트릭 사용 ({age:.1}초 전): {error_reason}"),
                    source: DegradedSource::Cache,
                }
            }
            _ => {
                debug!("캐시 없음 또는 만료, 기본 메트릭 사용");
                DegradedMetrics {
                    metrics: SystemMetrics::defaults(inner.vram_total_mb, uptime_seconds),
                    reason: format!("기본 메트릭 사용: {error_reason}"),
                    source: DegradedSource::Defaults,
                }
            }
        }
    }

    pub fn clear(&self) {
        self.inner.lock().snapshot = None;
    }
}
