//! 메트릭 집계기.
//!
//! 네 수집기를 동시에 호출해 하나의 `SystemMetrics`로 합친다.
//! 각 호출은 재시도 정책과 타임아웃으로 감싼다.
//! 일부만 실패하면 마지막으로 알려진 값(없으면 기본값)으로 채우고
//! 해당 컴포넌트를 성능 저하로 기록한다. 네 개 모두 실패할 때만 에러.

use chrono::Utc;
use parking_lot::Mutex;
use resguard_core::config::WatchdogConfig;
use resguard_core::error::CoreError;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::{
    percent_of, ProcessCounts, RamReading, SystemMetrics, VramReading,
};
use resguard_core::ports::monitor::{CpuSource, ProcessSource, RamSource, VramSource};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::collaborators::Collaborators;
use crate::guard::CallGuard;
use crate::health::ComponentHealthTracker;
use crate::retry::RetryPolicy;

/// 한 번의 수집 결과
#[derive(Debug, Clone)]
pub struct Collection {
    pub metrics: SystemMetrics,
    /// 대체값이 들어간 컴포넌트
    pub degraded: Vec<Component>,
}

impl Collection {
    /// 네 수집기 모두 실측값인지
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// NaN이나 무한대가 섞인 측정값은 실패로 취급한다
trait Measured {
    fn is_finite(&self) -> bool;
}

impl Measured for f64 {
    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl Measured for VramReading {
    fn is_finite(&self) -> bool {
        self.used_mb.is_finite() && self.total_mb.map_or(true, f64::is_finite)
    }
}

impl Measured for RamReading {
    fn is_finite(&self) -> bool {
        self.used_mb.is_finite() && self.percent.is_finite()
    }
}

impl Measured for ProcessCounts {
    fn is_finite(&self) -> bool {
        true
    }
}

/// 컴포넌트별 마지막 실측값
#[derive(Debug, Default)]
struct LastKnown {
    vram: Option<VramReading>,
    cpu: Option<f64>,
    ram: Option<RamReading>,
    processes: Option<ProcessCounts>,
}

/// 메트릭 집계기
pub struct MetricsAggregator {
    vram: Arc<dyn VramSource>,
    cpu: Arc<dyn CpuSource>,
    ram: Arc<dyn RamSource>,
    processes: Arc<dyn ProcessSource>,
    retry: RetryPolicy,
    guard: CallGuard,
    health: Arc<ComponentHealthTracker>,
    vram_total_mb: f64,
    started_at: Instant,
    last_known: Mutex<LastKnown>,
}

impl MetricsAggregator {
    pub fn new(
        collaborators: &Collaborators,
        config: &WatchdogConfig,
        health: Arc<ComponentHealthTracker>,
        started_at: Instant,
    ) -> Self {
        Self {
            vram: collaborators.vram.clone(),
            cpu: collaborators.cpu.clone(),
            ram: collaborators.ram.clone(),
            processes: collaborators.processes.clone(),
            retry: RetryPolicy::new(config.retry.clone()),
            guard: CallGuard::new(config.circuit_breaker.call_timeout()),
            health,
            vram_total_mb: config.vram_total_mb,
            started_at,
            last_known: Mutex::new(LastKnown::default()),
        }
    }

    /// 워치독 시작 후 경과 시간 (초)
    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// 네 수집기를 호출해 스냅샷 생성
    pub async fn collect(&self) -> Result<Collection, CoreError> {
        let (vram, cpu, ram, processes) = tokio::join!(
            self.guarded(|| {
                let source = self.vram.clone();
                move || source.read_vram()
            }),
            self.guarded(|| {
                let source = self.cpu.clone();
                move || source.read_cpu_percent()
            }),
            self.guarded(|| {
                let source = self.ram.clone();
                move || source.read_ram()
            }),
            self.read_process_counts_inner(),
        );

        let mut degraded = Vec::new();
        let mut failures = Vec::new();
        let mut last = self.last_known.lock();

        let vram = self.settle(Component::Vram, vram, &mut last.vram, &mut degraded, &mut failures);
        let cpu = self.settle(Component::Cpu, cpu, &mut last.cpu, &mut degraded, &mut failures);
        let ram = self.settle(Component::Ram, ram, &mut last.ram, &mut degraded, &mut failures);
        let processes = self.settle(
            Component::ProcessCount,
            processes,
            &mut last.processes,
            &mut degraded,
            &mut failures,
        );
        drop(last);

        if degraded.len() == Component::ALL.len() {
            return Err(CoreError::CollectionFailed(failures.join("; ")));
        }

        let vram_total_mb = vram
            .and_then(|v| v.total_mb)
            .filter(|total| *total > 0.0)
            .unwrap_or(self.vram_total_mb);
        let vram_used_mb = vram.map(|v| v.used_mb).unwrap_or(0.0);
        let ram = ram.unwrap_or(RamReading {
            used_mb: 0.0,
            percent: 0.0,
        });
        let processes = processes.unwrap_or(ProcessCounts {
            total: 0,
            monitored: 0,
        });

        let metrics = SystemMetrics {
            timestamp: Utc::now(),
            vram_used_mb,
            vram_total_mb,
            vram_percent: percent_of(vram_used_mb, vram_total_mb),
            cpu_percent: cpu.unwrap_or(0.0).clamp(0.0, 100.0),
            ram_used_mb: ram.used_mb,
            ram_percent: ram.percent.clamp(0.0, 100.0),
            process_count: processes.total,
            monitored_process_count: processes.monitored,
            uptime_seconds: self.uptime_seconds(),
        };
        debug!(
            "메트릭 수집: VRAM {:.1}%, CPU {:.1}%, RAM {:.1}%, 감시 대상 {}개",
            metrics.vram_percent,
            metrics.cpu_percent,
            metrics.ram_percent,
            metrics.monitored_process_count
        );

        Ok(Collection { metrics, degraded })
    }

    /// 프로세스 수만 다시 조회 (긴급 정리 후 재확인용)
    pub async fn read_process_counts(&self) -> Result<ProcessCounts, CoreError> {
        let counts = self.read_process_counts_inner().await;
        match &counts {
            Ok(c) => {
                self.health.record_success(Component::ProcessCount);
                self.last_known.lock().processes = Some(*c);
            }
            Err(e) => self
                .health
                .record_failure(Component::ProcessCount, &e.to_string()),
        }
        counts
    }

    async fn read_process_counts_inner(&self) -> Result<ProcessCounts, CoreError> {
        self.guarded(|| {
            let source = self.processes.clone();
            move || source.read_process_counts()
        })
        .await
    }

    /// 재시도 + 타임아웃으로 블로킹 호출 실행
    ///
    /// `make_call`은 시도마다 새 블로킹 클로저를 만든다.
    async fn guarded<T, M, C>(&self, make_call: M) -> Result<T, CoreError>
    where
        M: Fn() -> C,
        C: FnOnce() -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.guard;
        self.retry.with_retry(|| guard.call(make_call())).await
    }

    /// 수집 결과를 건강 상태에 반영하고 실측값 또는 마지막 값을 돌려준다
    fn settle<T: Copy + Measured>(
        &self,
        component: Component,
        result: Result<T, CoreError>,
        last: &mut Option<T>,
        degraded: &mut Vec<Component>,
        failures: &mut Vec<String>,
    ) -> Option<T> {
        let result = result.and_then(|value| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(CoreError::Collector {
                    component,
                    message: "비정상 측정값 (NaN 또는 무한대)".to_string(),
                })
            }
        });
        match result {
            Ok(value) => {
                self.health.record_success(component);
                *last = Some(value);
                Some(value)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("{component} 수집 실패, 대체값 사용: {message}");
                self.health.record_failure(component, &message);
                degraded.push(component);
                failures.push(format!("{component}: {message}"));
                *last
            }
        }
    }
}
