//! 리소스 메트릭 수집 포트.
//!
//! 구현: `resguard-monitor` crate (sysinfo, nvidia-smi)

use crate::error::CoreError;
use crate::models::metrics::{ProcessCounts, RamReading, VramReading};

/// GPU 메모리 조회
pub trait VramSource: Send + Sync {
    fn read_vram(&self) -> Result<VramReading, CoreError>;
}

/// CPU 사용률 조회 (0.0 ~ 100.0)
pub trait CpuSource: Send + Sync {
    fn read_cpu_percent(&self) -> Result<f64, CoreError>;
}

/// RAM 사용량 조회
pub trait RamSource: Send + Sync {
    fn read_ram(&self) -> Result<RamReading, CoreError>;
}

/// 전체/감시 대상 프로세스 수 조회
pub trait ProcessSource: Send + Sync {
    fn read_process_counts(&self) -> Result<ProcessCounts, CoreError>;
}
