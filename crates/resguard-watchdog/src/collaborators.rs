//! 외부 협력자 묶음.
//!
//! 워치독이 의존하는 포트 구현체를 `Arc<dyn T>`로 모아 전달한다.

use resguard_core::ports::mitigation::{ProcessCleaner, ShutdownHandler};
use resguard_core::ports::monitor::{CpuSource, ProcessSource, RamSource, VramSource};
use std::sync::Arc;

/// 워치독 협력자
#[derive(Clone)]
pub struct Collaborators {
    pub vram: Arc<dyn VramSource>,
    pub cpu: Arc<dyn CpuSource>,
    pub ram: Arc<dyn RamSource>,
    pub processes: Arc<dyn ProcessSource>,
    pub cleaner: Arc<dyn ProcessCleaner>,
    pub shutdown: Arc<dyn ShutdownHandler>,
}
