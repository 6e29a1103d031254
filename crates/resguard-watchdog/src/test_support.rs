//! 단위 테스트용 가짜 호스트.

use parking_lot::Mutex;
use resguard_core::error::CoreError;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::{CleanupResult, ProcessCounts, RamReading, VramReading};
use resguard_core::ports::mitigation::{ProcessCleaner, ShutdownHandler};
use resguard_core::ports::monitor::{CpuSource, ProcessSource, RamSource, VramSource};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::collaborators::Collaborators;

pub(crate) struct HostState {
    pub vram_used_mb: f64,
    pub vram_total_mb: Option<f64>,
    pub cpu_percent: f64,
    pub ram: RamReading,
    pub total_processes: u32,
    pub monitored: u32,
    pub failing: BTreeSet<Component>,
    /// 정리 후 남는 감시 대상 수
    pub after_cleanup: Option<u32>,
    pub cleanup_fails: bool,
    pub cleanup_calls: Vec<u32>,
    pub shutdown_reasons: Vec<String>,
    pub reads: BTreeMap<Component, u32>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            vram_used_mb: 1024.0,
            vram_total_mb: Some(8192.0),
            cpu_percent: 10.0,
            ram: RamReading {
                used_mb: 4096.0,
                percent: 40.0,
            },
            total_processes: 200,
            monitored: 2,
            failing: BTreeSet::new(),
            after_cleanup: None,
            cleanup_fails: false,
            cleanup_calls: Vec::new(),
            shutdown_reasons: Vec::new(),
            reads: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut self.state.lock());
    }

    pub fn fail(&self, component: Component) {
        self.state.lock().failing.insert(component);
    }

    pub fn fail_all(&self) {
        self.state.lock().failing.extend(Component::ALL);
    }

    pub fn recover_all(&self) {
        self.state.lock().failing.clear();
    }

    pub fn reads(&self, component: Component) -> u32 {
        self.state.lock().reads.get(&component).copied().unwrap_or(0)
    }

    pub fn cleanup_calls(&self) -> Vec<u32> {
        self.state.lock().cleanup_calls.clone()
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
        f: impl FnOnce(&HostState) -> T,
    ) -> Result<T, CoreError> {
        let mut state = self.state.lock();
        *state.reads.entry(component).or_default() += 1;
        if state.failing.contains(&component) {
            return Err(CoreError::Collector {
                component,
                message: "테스트 실패".to_string(),
            });
        }
        Ok(f(&state))
    }
}

impl VramSource for FakeHost {
    fn read_vram(&self) -> Result<VramReading, CoreError> {
        self.read(Component::Vram, |s| VramReading {
            used_mb: s.vram_used_mb,
            total_mb: s.vram_total_mb,
        })
    }
}

impl CpuSource for FakeHost {
    fn read_cpu_percent(&self) -> Result<f64, CoreError> {
        self.read(Component::Cpu, |s| s.cpu_percent)
    }
}

impl RamSource for FakeHost {
    fn read_ram(&self) -> Result<RamReading, CoreError> {
        self.read(Component::Ram, |s| s.ram)
    }
}

impl ProcessSource for FakeHost {
    fn read_process_counts(&self) -> Result<ProcessCounts, CoreError> {
        self.read(Component::ProcessCount, |s| ProcessCounts {
            total: s.total_processes,
            monitored: s.monitored,
        })
    }
}

impl ProcessCleaner for FakeHost {
    fn terminate_excess(&self, max_allowed: u32) -> Result<CleanupResult, CoreError> {
        let mut state = self.state.lock();
        state.cleanup_calls.push(max_allowed);
        if state.cleanup_fails {
            return Err(CoreError::Cleanup("권한 없음".to_string()));
        }
        let before = state.monitored;
        let after = state.after_cleanup.unwrap_or(before.min(max_allowed));
        state.monitored = after;
        Ok(CleanupResult {
            terminated: before.saturating_sub(after),
            failed: after.saturating_sub(max_allowed),
        })
    }
}

impl ShutdownHandler for FakeHost {
    fn force_shutdown(&self, reason: &str) {
        self.state.lock().shutdown_reasons.push(reason.to_string());
    }
}
