//! # resguard-watchdog
//!
//! 리소스 워치독 서브시스템.
//! 주기적으로 VRAM/CPU/RAM/프로세스 수를 수집해 임계값과 비교하고,
//! 알림과 긴급 조치를 이벤트로 발행한다. 수집 호출이 실패해도
//! 서킷 브레이커, 재시도, 폴백 캐시로 루프는 계속 돈다.
//!
//! ## 구조
//!
//! - [`controller`]: 공개 라이프사이클 API (`WatchdogController`)
//! - [`monitoring_loop`]: 일시정지/중단 가능한 주기 작업
//! - [`circuit_breaker`] / [`retry`] / [`guard`]: 수집 호출 보호
//! - [`aggregator`] / [`fallback`] / [`health`]: 수집과 성능 저하 대응
//! - [`threshold`] / [`emergency`]: 알림과 긴급 조치
//! - [`event_bus`]: `tokio::broadcast` 기반 이벤트 전달

pub mod aggregator;
pub mod circuit_breaker;
pub mod collaborators;
pub mod controller;
pub mod emergency;
pub mod event_bus;
pub mod fallback;
pub mod guard;
pub mod health;
pub mod monitoring_loop;
pub mod retry;
pub mod threshold;

#[cfg(test)]
pub(crate) mod test_support;

pub use collaborators::Collaborators;
pub use controller::WatchdogController;
pub use event_bus::EventBus;
