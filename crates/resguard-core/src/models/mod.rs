//! resguard 도메인 모델.
//!
//! 수집 주기마다 새로 만들어지는 스냅샷과, 워치독 인스턴스 수명 동안 유지되는
//! 상태 타입을 정의한다. 외부로 나가는 모델은 모두 `serde` Serialize/Deserialize를 구현한다.

pub mod alert;
pub mod event;
pub mod health;
pub mod metrics;
pub mod status;
