//! 프로세스 수 모니터링 및 초과 프로세스 정리.
//!
//! `ProcessSource`, `ProcessCleaner` 포트 구현.
//! 감시 대상 = 호스트 프로세스의 자손 + 이름이 설정과 일치하는 프로세스.

use resguard_core::config::MonitorConfig;
use resguard_core::error::CoreError;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::{CleanupResult, ProcessCounts};
use resguard_core::ports::mitigation::ProcessCleaner;
use resguard_core::ports::monitor::ProcessSource;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// 감시 대상 판별용 프로세스 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcEntry {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
    /// 시작 시각 (epoch 초)
    pub start_time: u64,
}

/// 감시 대상 프로세스 선택
///
/// 루트 프로세스 자신은 포함하지 않는다. 반환 순서는 최근 시작 순.
pub fn select_monitored(
    entries: &[ProcEntry],
    root_pid: u32,
    names: &[String],
    include_descendants: bool,
) -> Vec<ProcEntry> {
    let parents: HashMap<u32, Option<u32>> = entries.iter().map(|e| (e.pid, e.parent)).collect();

    let is_descendant = |pid: u32| -> bool {
        let mut seen = HashSet::new();
        let mut current = parents.get(&pid).copied().flatten();
        while let Some(parent) = current {
            if parent == root_pid {
                return true;
            }
            // 순환 방지
            if !seen.insert(parent) {
                return false;
            }
            current = parents.get(&parent).copied().flatten();
        }
        false
    };

    let mut selected: Vec<ProcEntry> = entries
        .iter()
        .filter(|e| e.pid != root_pid)
        .filter(|e| {
            names.iter().any(|n| n == &e.name) || (include_descendants && is_descendant(e.pid))
        })
        .cloned()
        .collect();

    selected.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.pid.cmp(&a.pid)));
    selected
}

/// 프로세스 추적기: `ProcessSource` + `ProcessCleaner` 포트 구현
pub struct ProcessTracker {
    sys: Mutex<System>,
    root_pid: u32,
    names: Vec<String>,
    include_descendants: bool,
}

impl ProcessTracker {
    /// 현재 프로세스를 루트로 하는 추적기 생성
    pub fn new(config: &MonitorConfig) -> Result<Self, CoreError> {
        let root = sysinfo::get_current_pid()
            .map_err(|e| CoreError::Internal(format!("현재 PID 조회 실패: {e}")))?;
        Ok(Self::with_root(root.as_u32(), config))
    }

    /// 지정 PID를 루트로 하는 추적기 생성
    pub fn with_root(root_pid: u32, config: &MonitorConfig) -> Self {
        Self {
            sys: Mutex::new(System::new()),
            root_pid,
            names: config.monitored_names.clone(),
            include_descendants: config.include_descendants,
        }
    }

    fn refreshed(&self) -> Result<MutexGuard<'_, System>, CoreError> {
        let mut sys = self.sys.lock().map_err(|e| CoreError::Collector {
            component: Component::ProcessCount,
            message: format!("시스템 잠금 실패: {e}"),
        })?;
        sys.refresh_processes(ProcessesToUpdate::All, true);
        Ok(sys)
    }

    fn entries(sys: &System) -> Vec<ProcEntry> {
        sys.processes()
            .values()
            // Linux에서는 스레드도 목록에 포함된다
            .filter(|p| p.thread_kind().is_none())
            .map(|p| ProcEntry {
                pid: p.pid().as_u32(),
                parent: p.parent().map(|pid| pid.as_u32()),
                name: p.name().to_string_lossy().to_string(),
                start_time: p.start_time(),
            })
            .collect()
    }

    fn monitored(&self, sys: &System) -> Vec<ProcEntry> {
        select_monitored(
            &Self::entries(sys),
            self.root_pid,
            &self.names,
            self.include_descendants,
        )
    }

    fn kill_all(sys: &System, targets: &[ProcEntry]) -> CleanupResult {
        let mut result = CleanupResult::default();
        for target in targets {
            let killed = sys
                .process(Pid::from_u32(target.pid))
                .map(|p| p.kill())
                .unwrap_or(false);
            if killed {
                info!("프로세스 종료: {} (pid={})", target.name, target.pid);
                result.terminated += 1;
            } else {
                warn!("프로세스 종료 실패: {} (pid={})", target.name, target.pid);
                result.failed += 1;
            }
        }
        result
    }

    /// 감시 대상 프로세스 전체 종료 (강제 종료 경로)
    pub fn terminate_all(&self) -> Result<CleanupResult, CoreError> {
        let sys = self.refreshed()?;
        let targets = self.monitored(&sys);
        Ok(Self::kill_all(&sys, &targets))
    }
}

impl ProcessSource for ProcessTracker {
    fn read_process_counts(&self) -> Result<ProcessCounts, CoreError> {
        let sys = self.refreshed()?;
        let entries = Self::entries(&sys);
        let monitored = select_monitored(
            &entries,
            self.root_pid,
            &self.names,
            self.include_descendants,
        );

        let counts = ProcessCounts {
            total: entries.len() as u32,
            monitored: monitored.len() as u32,
        };
        debug!(
            "프로세스 수: 전체 {}, 감시 대상 {}",
            counts.total, counts.monitored
        );
        Ok(counts)
    }
}

impl ProcessCleaner for ProcessTracker {
    /// 가장 최근에 시작된 프로세스부터 종료한다
    fn terminate_excess(&self, max_allowed: u32) -> Result<CleanupResult, CoreError> {
        let sys = self.refreshed()?;
        let monitored = self.monitored(&sys);
        let excess = monitored.len().saturating_sub(max_allowed as usize);
        if excess == 0 {
            return Ok(CleanupResult::default());
        }

        info!(
            "초과 프로세스 정리: {}개 중 {}개 종료",
            monitored.len(),
            excess
        );
        Ok(Self::kill_all(&sys, &monitored[..excess]))
    }
}
