//! # resguard-monitor
//!
//! 리소스 모니터링 어댑터.
//! `resguard-core`의 포트를 sysinfo와 `nvidia-smi`로 구현한다.
//! 모든 호출은 동기 호출이며 워치독이 blocking 스레드에서 실행한다.

pub mod gpu;
pub mod process;
pub mod shutdown;
pub mod system;
