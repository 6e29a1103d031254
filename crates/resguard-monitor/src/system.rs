//! CPU/RAM 모니터링.
//!
//! `CpuSource`, `RamSource` 포트 구현. sysinfo 기반.

use resguard_core::error::CoreError;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::{percent_of, RamReading};
use resguard_core::ports::monitor::{CpuSource, RamSource};
use std::sync::Mutex;
use sysinfo::System;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// sysinfo 기반 시스템 모니터: `CpuSource` + `RamSource` 포트 구현
///
/// CPU 사용률은 직전 갱신과의 차이로 계산되므로 같은 `System`을 계속 재사용한다.
pub struct SysInfoMonitor {
    sys: Mutex<System>,
}

impl SysInfoMonitor {
    /// 새 시스템 모니터 생성
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SysInfoMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSource for SysInfoMonitor {
    fn read_cpu_percent(&self) -> Result<f64, CoreError> {
        let mut sys = self.sys.lock().map_err(|e| CoreError::Collector {
            component: Component::Cpu,
            message: format!("시스템 잠금 실패: {e}"),
        })?;
        sys.refresh_cpu_usage();

        let cpu = f64::from(sys.global_cpu_usage());
        debug!("CPU 사용률: {:.1}%", cpu);
        Ok(cpu.clamp(0.0, 100.0))
    }
}

impl RamSource for SysInfoMonitor {
    fn read_ram(&self) -> Result<RamReading, CoreError> {
        let mut sys = self.sys.lock().map_err(|e| CoreError::Collector {
            component: Component::Ram,
            message: format!("시스템 잠금 실패: {e}"),
        })?;
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(CoreError::Collector {
                component: Component::Ram,
                message: "전체 메모리를 읽을 수 없습니다".to_string(),
            });
        }

        let used_mb = sys.used_memory() as f64 / BYTES_PER_MB;
        let total_mb = total as f64 / BYTES_PER_MB;
        let reading = RamReading {
            used_mb,
            percent: percent_of(used_mb, total_mb),
        };

        debug!(
            "RAM 사용량: {:.0}/{:.0}MB ({:.1}%)",
            reading.used_mb, total_mb, reading.percent
        );
        Ok(reading)
    }
}
