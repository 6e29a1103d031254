//! resguard 핵심 에러 타입.
//!
//! 어댑터와 워치독은 모두 `CoreError`를 반환한다.
//! 정상 운영 중의 에러는 이벤트로만 노출되고, 호출자에게 전파되는 것은
//! 설정 검증 실패뿐이다.

use thiserror::Error;

use crate::models::health::Component;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패: {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 개별 수집기 실패
    #[error("{component} 수집 실패: {message}")]
    Collector {
        /// 실패한 수집기
        component: Component,
        /// 실패 사유
        message: String,
    },

    /// 네 수집기 모두 실패
    #[error("메트릭 수집 전체 실패: {0}")]
    CollectionFailed(String),

    /// 서킷 브레이커가 열려 호출이 거부됨
    #[error("서킷 브레이커 열림, {retry_in_ms}ms 후 재시도 가능")]
    CircuitOpen {
        /// 복구 타임아웃까지 남은 시간 (밀리초)
        retry_in_ms: u64,
    },

    /// 실행 타임아웃
    #[error("실행 타임아웃: {timeout_ms}ms 초과")]
    Timeout {
        /// 초과된 타임아웃 시간 (밀리초)
        timeout_ms: u64,
    },

    /// 긴급 정리 실패
    #[error("프로세스 정리 실패: {0}")]
    Cleanup(String),
}

impl CoreError {
    /// 재시도해도 결과가 달라지지 않는 에러인지 판별
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CoreError::CircuitOpen { .. } | CoreError::Validation { .. } | CoreError::Config(_)
        )
    }
}
