//! Vector Store - 벡터 컬렉션 트레이트 및 유틸리티
//!
//! (id, document, metadata) 레코드를 저장하고 임베딩 거리로 최근접 검색을 수행하는
//! 협력 컴포넌트의 공통 인터페이스입니다. 임베딩 계산은 구현체 내부에서 수행합니다.
//!
//! 구현체:
//! - `SqliteCollection`: SQLite 파일 + 전수 코사인 검색
//! - `LanceCollection`: LanceDB ANN 검색

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::ticket::{Metadata, INDEXED_AT_KEY, TRACKED_KEYS};

/// 빈 쿼리(메타데이터 필터 전용) 스캔 결과의 거리 값
pub const FILTER_SCAN_DISTANCE: f32 = 1.0;

// ============================================================================
// Types
// ============================================================================

/// 저장 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    /// 컬렉션 내 식별자 (중복 허용)
    pub id: String,
    /// 정규화된 티켓 문서
    pub document: String,
    /// 필터링용 메타데이터
    pub metadata: Metadata,
}

/// 쿼리 결과 행
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// 코사인 거리 (0.0 = 동일, 작을수록 유사)
    pub distance: f32,
}

/// 메타데이터 완전 일치 필터 (AND 결합)
///
/// 조건은 추가된 순서를 유지합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataFilter {
    conditions: Vec<(String, String)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 조건 추가 (빌더)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// 조건 추가 (같은 키는 값 교체)
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.conditions.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.conditions.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 필터 키 검증 (추적 메타데이터 키만 허용)
    pub fn validate(&self) -> Result<()> {
        for (key, _) in self.iter() {
            if !is_filterable_key(key) {
                bail!("Unsupported filter field: {}", key);
            }
        }
        Ok(())
    }

    /// 메타데이터가 모든 조건과 일치하는지
    ///
    /// 필드가 저장되지 않은 레코드는 매칭되지 않습니다.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.iter()
            .all(|(key, value)| metadata.get(key).map(String::as_str) == Some(value))
    }

    /// 사람이 읽을 수 있는 설명 (`issue_type=Bug, priority=High`)
    pub fn describe(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 필터 가능한 메타데이터 키인지
pub fn is_filterable_key(key: &str) -> bool {
    key == INDEXED_AT_KEY || TRACKED_KEYS.contains(&key)
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 이름 있는 영속 컬렉션 하나를 나타냅니다. 구현체는 열 때 컬렉션을
/// 생성하거나 기존 컬렉션에 재연결합니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 레코드 추가 (같은 id도 새 레코드로 추가)
    async fn add(&self, records: &[IndexedRecord]) -> Result<usize>;

    /// 최근접 검색
    ///
    /// `query_text`가 비어 있으면 필터만 적용한 스캔을 수행하고
    /// 거리는 `FILTER_SCAN_DISTANCE`로 보고합니다.
    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryHit>>;

    /// 저장 순서로 최대 `limit`개 메타데이터 조회
    async fn get(&self, limit: usize) -> Result<Vec<Metadata>>;

    /// 레코드 개수
    async fn count(&self) -> Result<usize>;

    /// 컬렉션 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 코사인 거리 (1 - 유사도, 0.0 ~ 2.0)
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

// ============================================================================
// Tests
// ============================================================================
