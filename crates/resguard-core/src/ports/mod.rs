//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! `resguard-monitor` crate가 이 trait들을 구현하며,
//! 워치독은 `Arc<dyn T>`로만 의존한다.
//!
//! 모든 포트는 동기 호출이다. 느리거나 멈출 수 있는 OS 호출을 감싸므로
//! 워치독이 blocking 스레드에서 타임아웃을 걸어 실행한다.

pub mod mitigation;
pub mod monitor;
