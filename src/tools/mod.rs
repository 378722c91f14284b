//! Agent Tool Surface - 대화형 에이전트용 도구 함수
//!
//! 네 가지 도구(add / search / statistics / filter)는 모두 태그된 응답을 반환합니다:
//! - 성공: `{"status": "success", "result": "<text>", ...extra}`
//! - 실패: `{"status": "error", "error_message": "<text>"}`
//!
//! 이 경계를 넘어 에러나 panic이 전파되지 않습니다.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::KbError;
use crate::knowledge::{
    filter_digest, search_digest, stats_digest, FilterCriteria, Formatter, KnowledgeBase,
    MAX_SEARCH_RESULTS,
};
use crate::ticket::Ticket;

// ============================================================================
// ToolResponse
// ============================================================================

/// 응답 상태 태그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// 태그된 도구 응답
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolResponse {
    pub fn success(result: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            result: Some(result.into()),
            error_message: None,
            extra: Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            result: None,
            error_message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// 추가 필드 (직렬화 실패 시 경고 후 null)
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize tool field '{}': {}", key, e);
            Value::Null
        });
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// 사람이 읽는 텍스트 (result 또는 error_message)
    pub fn text(&self) -> &str {
        self.result
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or("")
    }

    /// JSON 값으로 변환
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize tool response: {}", e);
            Value::Null
        })
    }
}

// ============================================================================
// Tools
// ============================================================================

/// 티켓 추가 도구
///
/// # Arguments
/// * `ticket_json` - JSON 인코딩된 티켓 (`key` 또는 `summary` 필수)
pub async fn add_ticket(kb: &KnowledgeBase, ticket_json: &str) -> ToolResponse {
    let ticket = match Ticket::from_json(ticket_json).and_then(|t| t.validate().map(|_| t)) {
        Ok(ticket) => ticket,
        Err(e) => return ToolResponse::error(e.to_string()),
    };

    match kb.add_ticket(&ticket).await {
        Ok(ticket_id) => ToolResponse::success(format!(
            "Successfully added ticket {} to knowledge base",
            ticket_id
        ))
        .with("ticket_id", ticket_id),
        Err(KbError::Validation(message)) => ToolResponse::error(message),
        Err(e) => ToolResponse::error(format!("Failed to add ticket: {}", e)),
    }
}

/// 티켓 시맨틱 검색 도구
///
/// # Arguments
/// * `query` - 찾을 내용 설명
/// * `limit` - 최대 결과 수 (1 ~ 20으로 제한)
pub async fn search_tickets(kb: &KnowledgeBase, query: &str, limit: i64) -> ToolResponse {
    let limit = limit.clamp(1, MAX_SEARCH_RESULTS as i64) as usize;
    let results = kb.search(query, limit, None).await;
    let tickets = Formatter::search().summarize(&results);

    ToolResponse::success(search_digest(&tickets))
        .with("total_found", tickets.len())
        .with("tickets", &tickets)
}

/// 지식베이스 통계 도구
pub async fn get_statistics(kb: &KnowledgeBase) -> ToolResponse {
    let stats = kb.stats().await;

    if let Some(ref message) = stats.error {
        return ToolResponse::error(message.clone());
    }

    ToolResponse::success(stats_digest(&stats)).with("raw_stats", &stats)
}

/// 티켓 속성 필터 도구
///
/// issue_type / priority / status / assignee 중 최소 하나가 필요합니다.
pub async fn filter_tickets(kb: &KnowledgeBase, criteria: &FilterCriteria) -> ToolResponse {
    let filter = match criteria.to_filter() {
        Ok(filter) => filter,
        Err(e) => return ToolResponse::error(e.to_string()),
    };

    match kb.filter_by(&filter).await {
        Ok(results) => {
            let tickets = Formatter::filter().summarize(&results);
            ToolResponse::success(filter_digest(&filter, &tickets))
                .with("total_found", tickets.len())
                .with("tickets", &tickets)
        }
        Err(e) => ToolResponse::error(format!("Filter operation failed: {}", e)),
    }
}

// ============================================================================
// Tests
// ============================================================================
