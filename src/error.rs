//! 에러 타입
//!
//! 지식베이스 경계에서 사용하는 세 가지 에러 종류를 정의합니다.
//! 백엔드 내부는 `anyhow::Result` + `.context()`를 그대로 사용하고,
//! KnowledgeBase / tools 경계에서만 `KbError`로 분류합니다.

/// 지식베이스 에러
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    /// 잘못된 입력 (JSON 파싱 실패, 식별 필드 누락, 필터 조건 없음)
    ///
    /// 재시도하지 않고 즉시 호출자에게 전달됩니다.
    #[error("{0}")]
    Validation(String),

    /// 쓰기 경로 실패 (임베딩 계산, 디스크 I/O)
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    /// 읽기 경로 실패 (검색, 통계)
    #[error("query error: {0:#}")]
    Query(anyhow::Error),
}

impl KbError {
    /// 검증 에러 생성 헬퍼
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 검증 에러 여부
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// 지식베이스 Result 타입
pub type KbResult<T> = std::result::Result<T, KbError>;
