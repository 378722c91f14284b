//! ticket-kb - 티켓 시맨틱 지식베이스
//!
//! 이슈 트래커 티켓을 정규화된 문서 + 메타데이터로 벡터 컬렉션에 저장하고
//! 의미 기반 검색, 속성 필터, 통계를 제공합니다.
//!
//! 벡터 컬렉션은 SQLite(기본) 또는 LanceDB, 임베딩은 Gemini API 또는
//! 로컬 해싱 임베딩을 사용합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod seed;
pub mod ticket;
pub mod tools;

// Re-exports
pub use config::{get_data_dir, BackendKind, EmbedderKind, KbConfig};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding,
    HashingEmbedding,
};
pub use error::{KbError, KbResult};
pub use knowledge::{
    FilterCriteria, Formatter, KnowledgeBase, LanceCollection, MetadataFilter, SearchResult,
    SqliteCollection, StatsSnapshot, TicketSummary, VectorStore,
};
pub use seed::{load_sample_data, SeedReport};
pub use ticket::{build_document, extract_metadata, FieldValue, Metadata, Ticket};
pub use tools::{ToolResponse, ToolStatus};
