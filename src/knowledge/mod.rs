//! Knowledge 모듈 - 티켓 시맨틱 지식베이스
//!
//! - Vector: 벡터 컬렉션 트레이트 (임베딩 + 최근접 검색 협력 컴포넌트)
//! - SQLite: 기본 영속 컬렉션 (전수 코사인 검색)
//! - LanceDB: ANN 컬렉션
//! - Store: add / search / stats / filter
//! - Format: 검색/필터/통계 결과 요약

mod format;
mod lance;
mod sqlite;
mod store;
mod vector;

// Re-exports
pub use format::{
    filter_digest, search_digest, stats_digest, summary_text, Formatter, TicketSummary,
    UNASSIGNED,
};
pub use lance::LanceCollection;
pub use sqlite::SqliteCollection;
pub use store::{
    relevance_from_distance, synthesize_ticket_id, FilterCriteria, Histogram, KnowledgeBase,
    SearchResult, StatsSnapshot, FILTER_RESULT_LIMIT, MAX_SEARCH_RESULTS, STATS_SAMPLE_LIMIT,
    UNKNOWN_BUCKET,
};
pub use vector::{
    cosine_distance, cosine_similarity, is_filterable_key, IndexedRecord, MetadataFilter,
    QueryHit, VectorStore, FILTER_SCAN_DISTANCE,
};
