//! GPU 메모리 모니터링.
//!
//! `VramSource` 포트 구현.
//! NVIDIA 드라이버의 `nvidia-smi` CSV 출력을 파싱한다. GPU가 없는 환경은 `StaticVram` 사용.

use resguard_core::config::MonitorConfig;
use resguard_core::error::CoreError;
use resguard_core::models::health::Component;
use resguard_core::models::metrics::VramReading;
use resguard_core::ports::monitor::VramSource;
use std::process::Command;
use tracing::debug;

fn vram_error(message: impl Into<String>) -> CoreError {
    CoreError::Collector {
        component: Component::Vram,
        message: message.into(),
    }
}

/// `nvidia-smi --query-gpu=memory.used,memory.total --format=csv,noheader,nounits`
/// 출력 한 줄 파싱 → (used_mb, total_mb)
pub fn parse_memory_line(line: &str) -> Result<(f64, f64), CoreError> {
    let mut fields = line.split(',').map(str::trim);
    let used = fields
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| vram_error("memory.used 필드 없음"))?;
    let total = fields
        .next()
        .ok_or_else(|| vram_error("memory.total 필드 없음"))?;

    let used: f64 = used
        .parse()
        .map_err(|_| vram_error(format!("memory.used 파싱 실패: {used}")))?;
    let total: f64 = total
        .parse()
        .map_err(|_| vram_error(format!("memory.total 파싱 실패: {total}")))?;
    Ok((used, total))
}

/// nvidia-smi 기반 VRAM 조회기
pub struct NvidiaSmiVram {
    command: String,
    gpu_index: u32,
}

impl NvidiaSmiVram {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            command: config.vram_command.clone(),
            gpu_index: config.gpu_index,
        }
    }
}

impl VramSource for NvidiaSmiVram {
    fn read_vram(&self) -> Result<VramReading, CoreError> {
        let output = Command::new(&self.command)
            .arg(format!("--id={}", self.gpu_index))
            .arg("--query-gpu=memory.used,memory.total")
            .arg("--format=csv,noheader,nounits")
            .output()
            .map_err(|e| vram_error(format!("{} 실행 실패: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(vram_error(format!(
                "{} 종료 코드 {:?}: {}",
                self.command,
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| vram_error("빈 출력"))?;
        let (used_mb, total_mb) = parse_memory_line(line)?;

        debug!("VRAM 사용량: {:.0}/{:.0}MB", used_mb, total_mb);
        Ok(VramReading {
            used_mb,
            total_mb: Some(total_mb),
        })
    }
}

/// 고정값 VRAM 조회기 (GPU 없는 호스트)
///
/// 전체 용량은 보고하지 않으므로 워치독 설정의 `vram_total_mb`가 사용된다.
#[derive(Debug, Clone, Default)]
pub struct StaticVram {
    pub used_mb: f64,
}

impl VramSource for StaticVram {
    fn read_vram(&self) -> Result<VramReading, CoreError> {
        Ok(VramReading {
            used_mb: self.used_mb,
            total_mb: None,
        })
    }
}
