//! Knowledge Store - 티켓 지식베이스
//!
//! 벡터 컬렉션 하나를 소유하고 add / search / stats / filter를 제공합니다.
//! 임베딩과 유사도 계산은 `VectorStore` 구현체에 위임합니다.
//!
//! 쓰기 실패는 `KbError::Storage`로 전파하고, 읽기 실패는 로그를 남긴 뒤
//! 빈 결과(또는 error 필드가 있는 통계)로 대체합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{BackendKind, KbConfig};
use crate::embedding::create_embedder;
use crate::error::{KbError, KbResult};
use crate::ticket::{build_document, extract_metadata, Metadata, Ticket};

use super::lance::LanceCollection;
use super::sqlite::SqliteCollection;
use super::vector::{IndexedRecord, MetadataFilter, VectorStore};

/// 검색 결과 최대 개수 (임베딩 유사도 계산 비용 상한)
pub const MAX_SEARCH_RESULTS: usize = 20;

/// 필터 조회 결과 개수
pub const FILTER_RESULT_LIMIT: usize = 20;

/// 통계 샘플 최대 크기
pub const STATS_SAMPLE_LIMIT: usize = 50;

/// 통계에서 값이 없는 레코드의 버킷 이름
pub const UNKNOWN_BUCKET: &str = "Unknown";

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (쿼리마다 계산, 저장되지 않음)
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub ticket_id: String,
    pub content: String,
    pub metadata: Metadata,
    /// 관련도 (0.0 ~ 1.0, 소수점 3자리, 높을수록 관련)
    pub relevance_score: f64,
}

/// 카테고리별 개수
pub type Histogram = BTreeMap<String, usize>;

/// 통계 스냅샷 (최대 50개 샘플 기준 근사치)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_tickets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_types: Option<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priorities: Option<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatsSnapshot {
    /// 실패 스냅샷
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// 메타데이터 샘플로 히스토그램 생성
    fn from_sample(total_tickets: usize, sample: &[Metadata]) -> Self {
        if sample.is_empty() {
            return Self {
                total_tickets,
                ..Self::default()
            };
        }

        let mut issue_types = Histogram::new();
        let mut priorities = Histogram::new();
        let mut statuses = Histogram::new();

        for metadata in sample {
            bump(&mut issue_types, metadata.get("issue_type"));
            bump(&mut priorities, metadata.get("priority"));
            bump(&mut statuses, metadata.get("status"));
        }

        Self {
            total_tickets,
            sample_size: Some(sample.len()),
            issue_types: Some(issue_types),
            priorities: Some(priorities),
            statuses: Some(statuses),
            error: None,
        }
    }
}

fn bump(histogram: &mut Histogram, value: Option<&String>) {
    let bucket = value.map(String::as_str).unwrap_or(UNKNOWN_BUCKET);
    *histogram.entry(bucket.to_string()).or_insert(0) += 1;
}

/// 속성 필터 조건 (최소 하나 필요)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterCriteria {
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
}

impl FilterCriteria {
    /// 메타데이터 필터로 변환 (빈 문자열은 조건 없음으로 취급)
    pub fn to_filter(&self) -> KbResult<MetadataFilter> {
        let mut filter = MetadataFilter::new();

        let fields = [
            ("issue_type", &self.issue_type),
            ("priority", &self.priority),
            ("status", &self.status),
            ("assignee", &self.assignee),
        ];

        for (key, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                filter.push(key, value);
            }
        }

        if filter.is_empty() {
            return Err(KbError::validation(
                "At least one filter criteria must be provided",
            ));
        }

        Ok(filter)
    }
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 티켓 지식베이스
///
/// 프로세스 시작 시 한 번 열고 핸들을 호출 경로로 전달합니다.
/// 같은 key로 동시에 추가하면 중복 레코드가 생깁니다.
pub struct KnowledgeBase {
    collection: Arc<dyn VectorStore>,
}

impl KnowledgeBase {
    /// 설정에 맞는 백엔드로 지식베이스 열기
    ///
    /// 기존 컬렉션이 있으면 재연결하고, 없으면 생성합니다.
    pub async fn open(config: &KbConfig) -> anyhow::Result<Self> {
        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)
                .context("Failed to create data directory")?;
        }

        let embedder = create_embedder(config.embedder)?;

        let collection: Arc<dyn VectorStore> = match config.backend {
            BackendKind::Sqlite => {
                let db_path = config.data_dir.join("knowledge.db");
                Arc::new(
                    SqliteCollection::open(&db_path, &config.collection, embedder)
                        .context("Failed to open SQLite collection")?,
                )
            }
            BackendKind::Lance => {
                let lance_path = config.data_dir.join("vectors.lance");
                Arc::new(
                    LanceCollection::open(&lance_path, &config.collection, embedder)
                        .await
                        .context("Failed to open LanceDB collection")?,
                )
            }
        };

        Ok(Self::new(collection))
    }

    /// 컬렉션을 직접 지정하여 생성
    pub fn new(collection: Arc<dyn VectorStore>) -> Self {
        Self { collection }
    }

    /// 내부 컬렉션 접근
    pub fn collection(&self) -> &dyn VectorStore {
        self.collection.as_ref()
    }

    /// 티켓 추가
    ///
    /// id는 `key`가 있으면 그대로, 없으면 `TICKET-xxxxxxxx` 형식으로 생성합니다.
    pub async fn add_ticket(&self, ticket: &Ticket) -> KbResult<String> {
        let ticket_id = ticket.key().unwrap_or_else(synthesize_ticket_id);

        let record = IndexedRecord {
            id: ticket_id.clone(),
            document: build_document(ticket),
            metadata: extract_metadata(ticket),
        };

        match self.collection.add(std::slice::from_ref(&record)).await {
            Ok(_) => {
                tracing::info!("Added ticket {} to knowledge base", ticket_id);
                Ok(ticket_id)
            }
            Err(e) => {
                tracing::error!("Failed to add ticket {}: {:#}", ticket_id, e);
                Err(KbError::Storage(e))
            }
        }
    }

    /// 시맨틱 검색 (에러 반환 버전)
    ///
    /// `limit`은 [1, 20]으로 제한됩니다. `filters`는 메타데이터 완전 일치 조건이며,
    /// 빈 쿼리 + 필터는 필터 전용 조회가 됩니다.
    pub async fn try_search(
        &self,
        query: &str,
        limit: usize,
        filters: Option<&MetadataFilter>,
    ) -> KbResult<Vec<SearchResult>> {
        let n_results = limit.clamp(1, MAX_SEARCH_RESULTS);
        let empty = MetadataFilter::new();
        let filter = filters.unwrap_or(&empty);

        filter.validate().map_err(KbError::Query)?;

        let hits = self
            .collection
            .query(query, n_results, filter)
            .await
            .map_err(KbError::Query)?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                ticket_id: hit.id,
                content: hit.document,
                metadata: hit.metadata,
                relevance_score: relevance_from_distance(hit.distance),
            })
            .collect())
    }

    /// 시맨틱 검색
    ///
    /// 실패해도 에러를 올리지 않고 로그 후 빈 결과를 반환합니다.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: Option<&MetadataFilter>,
    ) -> Vec<SearchResult> {
        match self.try_search(query, limit, filters).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// 속성 필터 조회
    ///
    /// 빈 시맨틱 쿼리로 같은 검색 경로를 사용합니다.
    pub async fn filter(&self, criteria: &FilterCriteria) -> KbResult<Vec<SearchResult>> {
        let filter = criteria.to_filter()?;
        self.filter_by(&filter).await
    }

    /// 이미 만든 메타데이터 필터로 조회 (조건 없음은 검증 에러)
    pub async fn filter_by(&self, filter: &MetadataFilter) -> KbResult<Vec<SearchResult>> {
        if filter.is_empty() {
            return Err(KbError::validation(
                "At least one filter criteria must be provided",
            ));
        }
        Ok(self.search("", FILTER_RESULT_LIMIT, Some(filter)).await)
    }

    /// 통계 (에러 반환 버전)
    pub async fn try_stats(&self) -> KbResult<StatsSnapshot> {
        let count = self.collection.count().await.map_err(KbError::Query)?;
        if count == 0 {
            return Ok(StatsSnapshot::default());
        }

        let sample = self
            .collection
            .get(count.min(STATS_SAMPLE_LIMIT))
            .await
            .map_err(KbError::Query)?;

        Ok(StatsSnapshot::from_sample(count, &sample))
    }

    /// 통계
    ///
    /// 실패 시 `total_tickets: 0` + error 메시지를 반환합니다.
    pub async fn stats(&self) -> StatsSnapshot {
        match self.try_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Failed to get stats: {}", e);
                StatsSnapshot::failed(e.to_string())
            }
        }
    }

    /// 저장된 레코드 수
    pub async fn count(&self) -> KbResult<usize> {
        self.collection.count().await.map_err(KbError::Query)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 거리 → 관련도 (1 - distance, 소수점 3자리, [0, 1]로 제한)
///
/// f32로 두면 JSON 변환 시 `0.8769999742507935`처럼 자릿수가 늘어납니다.
pub fn relevance_from_distance(distance: f32) -> f64 {
    let score = ((1.0 - f64::from(distance)) * 1000.0).round() / 1000.0;
    score.clamp(0.0, 1.0)
}

/// key 없는 티켓의 식별자 생성
pub fn synthesize_ticket_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("TICKET-{}", &uuid[..8])
}

// ============================================================================
// Tests
// ============================================================================
