//! 통합 테스트 공용 가짜 호스트와 이벤트 헬퍼.

#![allow(dead_code)]

use parking_lot::Mutex;
use resguard_core::config::WatchdogConfig;
use resguard_core::error::CoreError;
use resguard_core::models::event::WatchdogEvent;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::{CleanupResult, ProcessCounts, RamReading, VramReading};
use resguard_core::ports::mitigation::{ProcessCleaner, ShutdownHandler};
use resguard_core::ports::monitor::{CpuSource, ProcessSource, RamSource, VramSource};
use resguard_watchdog::Collaborators;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

pub struct HostState {
    pub vram_used_mb: f64,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub monitored: u32,
    pub failing: BTreeSet<Component>,
    /// 모든 읽기에 걸리는 지연
    pub read_delay: Duration,
    pub after_cleanup: Option<u32>,
    pub cleanup_calls: u32,
    pub shutdown_reasons: Vec<String>,
    pub collections: u32,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            vram_used_mb: 1024.0,
            cpu_percent: 12.0,
            ram_percent: 35.0,
            monitored: 1,
            failing: BTreeSet::new(),
            read_delay: Duration::ZERO,
            after_cleanup: None,
            cleanup_calls: 0,
            shutdown_reasons: Vec::new(),
            collections: 0,
        }
    }
}

#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut self.state.lock());
    }

    pub fn fail_all(&self) {
        self.state.lock().failing.extend(Component::ALL);
    }

    pub fn recover_all(&self) {
        self.state.lock().failing.clear();
    }

    /// CPU 읽기 횟수 = 수집 시도 횟수
    pub fn collections(&self) -> u32 {
        self.state.lock().collections
    }

    pub fn cleanup_calls(&self) -> u32 {
        self.state.lock().cleanup_calls
    }

    pub fn shutdown_reasons(&self) -> Vec<String> {
        self.state.lock().shutdown_reasons.clone()
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            vram: self.clone(),
            cpu: self.clone(),
            ram: self.clone(),
            processes: self.clone(),
            cleaner: self.clone(),
            shutdown: self.clone(),
        }
    }

    fn read<T>(
        &self,
        component: Component,
        f: impl FnOnce(&mut HostState) -> T,
    ) -> Result<T, CoreError> {
        let delay = self.state.lock().read_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock();
        if state.failing.contains(&component) {
            return Err(CoreError::Collector {
                component,
                message: "센서 응답 없음".to_string(),
            });
        }
        Ok(f(&mut state))
    }
}

impl VramSource for FakeHost {
    fn read_vram(&self) -> Result<VramReading, CoreError> {
        self.read(Component::Vram, |s| VramReading {
            used_mb: s.vram_used_mb,
            total_mb: Some(8192.0),
        })
    }
}

impl CpuSource for FakeHost {
    fn read_cpu_percent(&self) -> Result<f64, CoreError> {
        {
            self.state.lock().collections += 1;
        }
        self.read(Component::Cpu, |s| s.cpu_percent)
    }
}

impl RamSource for FakeHost {
    fn read_ram(&self) -> Result<RamReading, CoreError> {
        self.read(Component::Ram, |s| RamReading {
            used_mb: s.ram_percent * 160.0,
            percent: s.ram_percent,
        })
    }
}

impl ProcessSource for FakeHost {
    fn read_process_counts(&self) -> Result<ProcessCounts, CoreError> {
        self.read(Component::ProcessCount, |s| ProcessCounts {
            total: 150,
            monitored: s.monitored,
        })
    }
}

impl ProcessCleaner for FakeHost {
    fn terminate_excess(&self, max_allowed: u32) -> Result<CleanupResult, CoreError> {
        let mut state = self.state.lock();
        state.cleanup_calls += 1;
        let before = state.monitored;
        let after = state.after_cleanup.unwrap_or(before.min(max_allowed));
        state.monitored = after;
        Ok(CleanupResult {
            terminated: before.saturating_sub(after),
            failed: 0,
        })
    }
}

impl ShutdownHandler for FakeHost {
    fn force_shutdown(&self, reason: &str) {
        self.state.lock().shutdown_reasons.push(reason.to_string());
    }
}

/// 짧은 주기, 재시도 1회의 테스트 설정
pub fn fast_config() -> WatchdogConfig {
    let mut config = WatchdogConfig {
        check_interval_seconds: 0.05,
        health_check_interval_seconds: 0.1,
        cleanup_grace_seconds: 0.01,
        ..WatchdogConfig::default()
    };
    config.retry.max_retries = 1;
    config.circuit_breaker.call_timeout_seconds = 1.0;
    config
}

/// 조건을 만족하는 이벤트가 올 때까지 수신 (시간 초과 시 None)
pub async fn wait_for(
    rx: &mut Receiver<WatchdogEvent>,
    timeout: Duration,
    mut predicate: impl FnMut(&WatchdogEvent) -> bool,
) -> Option<WatchdogEvent> {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// 지정 시간 동안 받은 이벤트 전부
pub async fn collect_for(rx: &mut Receiver<WatchdogEvent>, duration: Duration) -> Vec<WatchdogEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(duration, async {
        loop {
            match rx.recv().await {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
    .await;
    events
}

/// 이미 도착해 있는 이벤트 버리기
pub fn drain(rx: &mut Receiver<WatchdogEvent>) {
    while !matches!(rx.try_recv(), Err(TryRecvError::Empty | TryRecvError::Closed)) {}
}

pub fn names(events: &[WatchdogEvent]) -> Vec<&'static str> {
    events.iter().map(WatchdogEvent::name).collect()
}
