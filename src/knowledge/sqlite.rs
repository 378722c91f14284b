//! SQLite Collection - rusqlite 기반 영속 벡터 컬렉션
//!
//! 레코드(id, 문서, 메타데이터 JSON, 임베딩 BLOB)를 SQLite 파일 하나에 저장하고
//! 전수 코사인 거리 계산으로 최근접 검색을 수행합니다.
//! 저장 위치: ~/.ticket-kb/knowledge.db
//!
//! 메타데이터 필터는 `json_extract`로 SQL에서 적용합니다.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};

use crate::embedding::EmbeddingProvider;
use crate::ticket::Metadata;

use super::vector::{
    cosine_distance, IndexedRecord, MetadataFilter, QueryHit, VectorStore, FILTER_SCAN_DISTANCE,
};

/// 컬렉션 스키마 버전
const COLLECTION_VERSION: &str = "1.0";

// ============================================================================
// SqliteCollection
// ============================================================================

/// SQLite 벡터 컬렉션
pub struct SqliteCollection {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
    name: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteCollection {
    /// 컬렉션 열기 (없으면 생성)
    ///
    /// # Arguments
    /// * `path` - DB 파일 경로 (없으면 생성)
    /// * `name` - 컬렉션 이름
    /// * `embedder` - 문서/쿼리 임베딩 프로바이더
    pub fn open(path: &Path, name: &str, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let collection = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
            name: name.to_string(),
            embedder,
        };

        collection.initialize()?;
        collection.get_or_create_collection()?;
        Ok(collection)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                description TEXT,
                version TEXT NOT NULL,
                embedding_model TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
            CREATE INDEX IF NOT EXISTS idx_records_id ON records(collection, id);
            "#,
        )
        .context("Failed to create collection schema")?;

        tracing::debug!("SQLite collection schema initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 컬렉션 등록 또는 재연결
    ///
    /// 기존 컬렉션의 임베딩 모델/차원이 현재 프로바이더와 다르면 에러입니다.
    fn get_or_create_collection(&self) -> Result<()> {
        let conn = self.lock()?;

        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT embedding_model, dimension FROM collections WHERE name = ?1",
                params![self.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to look up collection")?;

        match existing {
            Some((model, dimension)) => {
                if model != self.embedder.name() || dimension as usize != self.embedder.dimension()
                {
                    anyhow::bail!(
                        "Collection '{}' was created with {} ({} dims), but the current embedder is {} ({} dims)",
                        self.name,
                        model,
                        dimension,
                        self.embedder.name(),
                        self.embedder.dimension()
                    );
                }
                tracing::info!("Connected to existing collection: {}", self.name);
            }
            None => {
                conn.execute(
                    "INSERT INTO collections (name, description, version, embedding_model, dimension, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        self.name,
                        "Issue tracker tickets knowledge base",
                        COLLECTION_VERSION,
                        self.embedder.name(),
                        self.embedder.dimension() as i64,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .context("Failed to create collection")?;
                tracing::info!("Created new collection: {}", self.name);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteCollection {
    async fn add(&self, records: &[IndexedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let documents: Vec<String> = records.iter().map(|r| r.document.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&documents)
            .await
            .context("Failed to embed documents")?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        for (record, embedding) in records.iter().zip(embeddings.iter()) {
            let metadata =
                serde_json::to_string(&record.metadata).context("Failed to encode metadata")?;

            tx.execute(
                "INSERT INTO records (collection, id, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.name,
                    record.id,
                    record.document,
                    metadata,
                    encode_embedding(embedding),
                ],
            )
            .context("Failed to insert record")?;
        }

        tx.commit().context("Failed to commit records")?;
        Ok(records.len())
    }

    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryHit>> {
        let query_embedding = if query_text.trim().is_empty() {
            None
        } else {
            Some(
                self.embedder
                    .embed_query(query_text)
                    .await
                    .context("Failed to embed query")?,
            )
        };

        let conn = self.lock()?;

        let mut sql =
            String::from("SELECT id, document, metadata, embedding FROM records WHERE collection = ?");
        let mut bindings: Vec<String> = vec![self.name.clone()];

        for (key, value) in filter.iter() {
            sql.push_str(" AND json_extract(metadata, ?) = ?");
            bindings.push(format!("$.{}", key));
            bindings.push(value.to_string());
        }
        sql.push_str(" ORDER BY seq");

        if query_embedding.is_none() {
            sql.push_str(&format!(" LIMIT {}", n_results));
        }

        let mut stmt = conn.prepare(&sql).context("Failed to prepare query")?;
        let rows = stmt
            .query_map(params_from_iter(bindings.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .context("Failed to execute query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read query rows")?;

        let mut hits = Vec::with_capacity(rows.len());
        for (id, document, metadata, embedding) in rows {
            let distance = match &query_embedding {
                Some(query) => cosine_distance(query, &decode_embedding(&embedding)),
                None => FILTER_SCAN_DISTANCE,
            };

            hits.push(QueryHit {
                id,
                document,
                metadata: decode_metadata(&metadata)?,
                distance,
            });
        }

        if query_embedding.is_some() {
            hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
            hits.truncate(n_results);
        }

        tracing::debug!(
            "SQLite query returned {} hits (filter: [{}])",
            hits.len(),
            filter.describe()
        );
        Ok(hits)
    }

    async fn get(&self, limit: usize) -> Result<Vec<Metadata>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT metadata FROM records WHERE collection = ?1 ORDER BY seq LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![self.name, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read metadata rows")?;

        rows.iter().map(|m| decode_metadata(m)).collect()
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![self.name],
                |row| row.get(0),
            )
            .context("Failed to count records")?;

        Ok(count as usize)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// f32 벡터 → little-endian BLOB
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// little-endian BLOB → f32 벡터
fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn decode_metadata(json: &str) -> Result<Metadata> {
    serde_json::from_str(json).context("Failed to decode stored metadata")
}

// ============================================================================
// Tests
// ============================================================================
