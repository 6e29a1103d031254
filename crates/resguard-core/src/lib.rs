//! # resguard-core
//!
//! resguard 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 워치독과 어댑터 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 메트릭 스냅샷, 컴포넌트 건강 상태, 알림, 이벤트
//! - [`ports`]: 메트릭 수집기/정리기/강제 종료 포트 인터페이스
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 워치독/모니터 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
