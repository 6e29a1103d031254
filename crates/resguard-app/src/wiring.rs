//! 어댑터 조립.
//!
//! `MonitorConfig`에 따라 포트 구현체를 만들어 워치독 협력자로 묶는다.

use resguard_core::config::MonitorConfig;
use resguard_core::error::CoreError;
use resguard_core::ports::monitor::VramSource;
use resguard_monitor::gpu::{NvidiaSmiVram, StaticVram};
use resguard_monitor::process::ProcessTracker;
use resguard_monitor::shutdown::ExitShutdownHandler;
use resguard_monitor::system::SysInfoMonitor;
use resguard_watchdog::Collaborators;
use std::sync::Arc;
use tracing::info;

/// 현재 프로세스를 호스트로 보는 협력자 생성
pub fn build_collaborators(config: &MonitorConfig) -> Result<Collaborators, CoreError> {
    let system = Arc::new(SysInfoMonitor::new());
    let tracker = Arc::new(ProcessTracker::new(config)?);

    let vram: Arc<dyn VramSource> = if config.gpu_enabled {
        info!(
            "VRAM 조회: {} (GPU {})",
            config.vram_command, config.gpu_index
        );
        Arc::new(NvidiaSmiVram::new(config))
    } else {
        info!("GPU 비활성화, VRAM 0으로 고정");
        Arc::new(StaticVram::default())
    };

    Ok(Collaborators {
        vram,
        cpu: system.clone(),
        ram: system,
        processes: tracker.clone(),
        cleaner: tracker.clone(),
        shutdown: Arc::new(ExitShutdownHandler::new(
            tracker,
            config.shutdown_exit_code,
        )),
    })
}
