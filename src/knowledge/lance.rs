//! LanceDB Collection - 고성능 벡터 컬렉션
//!
//! 컬렉션 이름과 같은 LanceDB 테이블 하나에 레코드를 저장합니다.
//! 추적 메타데이터 키마다 nullable 컬럼을 두어 `only_if` SQL 필터로 매칭합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::DistanceType;

use crate::embedding::EmbeddingProvider;
use crate::ticket::{Metadata, INDEXED_AT_KEY, TRACKED_KEYS};

use super::vector::{IndexedRecord, MetadataFilter, QueryHit, VectorStore, FILTER_SCAN_DISTANCE};

/// 벡터 컬럼 이름
const VECTOR_COLUMN: &str = "vector";

// ============================================================================
// LanceCollection
// ============================================================================

/// LanceDB 벡터 컬렉션
///
/// Apache Arrow 기반 columnar 테이블에 코사인 거리 ANN 검색을 수행합니다.
pub struct LanceCollection {
    table: Table,
    name: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl LanceCollection {
    /// LanceDB 컬렉션 열기 (없으면 빈 테이블 생성)
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `name` - 컬렉션(테이블) 이름
    /// * `embedder` - 문서/쿼리 임베딩 프로바이더
    pub async fn open(
        path: &Path,
        name: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let dimension = embedder.dimension() as i32;
        let exists = db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?
            .iter()
            .any(|n| n == name);

        let table = if exists {
            let table = db
                .open_table(name)
                .execute()
                .await
                .context("Failed to open existing table")?;

            let stored = vector_dimension(&*table.schema().await?);
            if stored != Some(dimension) {
                anyhow::bail!(
                    "Collection '{}' stores {:?}-dim vectors, but the current embedder produces {} dims",
                    name,
                    stored,
                    dimension
                );
            }
            tracing::info!("Connected to existing collection: {}", name);
            table
        } else {
            let table = db
                .create_empty_table(name, Arc::new(Self::create_schema(dimension)))
                .execute()
                .await
                .context("Failed to create table")?;
            tracing::info!("Created new collection: {}", name);
            table
        };

        Ok(Self {
            table,
            name: name.to_string(),
            embedder,
        })
    }

    /// 컬렉션 테이블 스키마 생성
    fn create_schema(dimension: i32) -> Schema {
        let mut fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
        ];

        for key in metadata_columns() {
            fields.push(Field::new(key, DataType::Utf8, true));
        }

        fields.push(Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ));

        Schema::new(fields)
    }

    /// 레코드 + 임베딩을 Arrow RecordBatch로 변환
    fn records_to_batch(
        records: &[IndexedRecord],
        embeddings: &[Vec<f32>],
        dimension: i32,
    ) -> Result<RecordBatch> {
        if records.is_empty() {
            anyhow::bail!("Cannot create batch from empty records");
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension as usize) {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                dimension,
                bad.len()
            );
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let documents: Vec<&str> = records.iter().map(|r| r.document.as_str()).collect();
        let metadata_json = records
            .iter()
            .map(|r| serde_json::to_string(&r.metadata))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to encode metadata")?;

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(documents)),
            Arc::new(StringArray::from(metadata_json)),
        ];

        for key in metadata_columns() {
            let values: Vec<Option<&str>> = records
                .iter()
                .map(|r| r.metadata.get(key).map(String::as_str))
                .collect();
            columns.push(Arc::new(StringArray::from(values)));
        }

        let flat: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;
        columns.push(Arc::new(vectors));

        RecordBatch::try_new(Arc::new(Self::create_schema(dimension)), columns)
            .context("Failed to create RecordBatch")
    }
}

#[async_trait]
impl VectorStore for LanceCollection {
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

        let batch =
            Self::records_to_batch(records, &embeddings, self.embedder.dimension() as i32)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        self.table
            .add(batches)
            .execute()
            .await
            .context("Failed to add records to table")?;

        Ok(records.len())
    }

    async fn query(
        &self,
        query_text: &str,
        n_results: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryHit>> {
        let predicate = filter_predicate(filter);

        let stream = if query_text.trim().is_empty() {
            let mut query = self.table.query().limit(n_results);
            if let Some(ref predicate) = predicate {
                query = query.only_if(predicate);
            }
            query.execute().await.context("Failed to execute filter scan")?
        } else {
            let query_embedding = self
                .embedder
                .embed_query(query_text)
                .await
                .context("Failed to embed query")?;

            let mut query = self
                .table
                .vector_search(query_embedding)
                .context("Failed to create vector search")?
                .distance_type(DistanceType::Cosine)
                .limit(n_results);
            if let Some(ref predicate) = predicate {
                query = query.only_if(predicate);
            }
            query.execute().await.context("Failed to execute vector search")?
        };

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut hits = Vec::new();
        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let documents = string_column(&batch, "document")?;
            let metadata = string_column(&batch, "metadata")?;

            // _distance 컬럼 (벡터 검색 시 LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            for i in 0..batch.num_rows() {
                hits.push(QueryHit {
                    id: ids.value(i).to_string(),
                    document: documents.value(i).to_string(),
                    metadata: serde_json::from_str(metadata.value(i))
                        .context("Failed to decode stored metadata")?,
                    distance: distances
                        .map(|d| d.value(i))
                        .unwrap_or(FILTER_SCAN_DISTANCE),
                });
            }
        }

        tracing::debug!(
            "LanceDB query returned {} hits (filter: [{}])",
            hits.len(),
            filter.describe()
        );
        Ok(hits)
    }

    async fn get(&self, limit: usize) -> Result<Vec<Metadata>> {
        let stream = self
            .table
            .query()
            .limit(limit)
            .execute()
            .await
            .context("Failed to scan table")?;
        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut result = Vec::new();
        for batch in batches {
            let metadata = string_column(&batch, "metadata")?;
            for i in 0..batch.num_rows() {
                result.push(
                    serde_json::from_str(metadata.value(i))
                        .context("Failed to decode stored metadata")?,
                );
            }
        }

        Ok(result)
    }

    async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 메타데이터 전용 컬럼 (추적 키 + indexed_at)
fn metadata_columns() -> impl Iterator<Item = &'static str> {
    TRACKED_KEYS.into_iter().chain(std::iter::once(INDEXED_AT_KEY))
}

/// 필터 → LanceDB SQL 조건 (값의 작은따옴표는 이스케이프)
///
/// 키는 `MetadataFilter::validate`로 검증된 컬럼 이름이어야 합니다.
fn filter_predicate(filter: &MetadataFilter) -> Option<String> {
    if filter.is_empty() {
        return None;
    }

    let predicate = filter
        .iter()
        .map(|(key, value)| format!("`{}` = '{}'", key, value.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(" AND ");

    Some(predicate)
}

/// 스키마에서 벡터 차원 읽기
fn vector_dimension(schema: &Schema) -> Option<i32> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size),
        _ => None,
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbedding, HASHING_DIMENSION};
    use tempfile::TempDir;

    fn record(id: &str, document: &str, pairs: &[(&str, &str)]) -> IndexedRecord {
        IndexedRecord {
            id: id.to_string(),
            document: document.to_string(),
            metadata: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    async fn open(dir: &TempDir) -> LanceCollection {
        LanceCollection::open(
            &dir.path().join("vectors.lance"),
            "test_tickets",
            Arc::new(HashingEmbedding::new()),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_filter_predicate() {
        assert_eq!(filter_predicate(&MetadataFilter::new()), None);

        let filter = MetadataFilter::new()
            .with("issue_type", "Bug")
            .with("assignee", "O'Brien");
        assert_eq!(
            filter_predicate(&filter).as_deref(),
            Some("`issue_type` = 'Bug' AND `assignee` = 'O''Brien'")
        );
    }

    #[test]
    fn test_schema_vector_dimension() {
        let schema = LanceCollection::create_schema(HASHING_DIMENSION as i32);
        assert_eq!(vector_dimension(&schema), Some(HASHING_DIMENSION as i32));
        assert!(schema.field_with_name("issue_type").unwrap().is_nullable());
    }

    #[tokio::test]
    async fn test_lance_collection_basic() {
        let temp_dir = TempDir::new().unwrap();
        let collection = open(&temp_dir).await;

        assert_eq!(collection.count().await.unwrap(), 0);

        let inserted = collection
            .add(&[
                record("L-1", "login authentication failing", &[("issue_type", "Bug")]),
                record("L-2", "dark mode for mobile app", &[("issue_type", "Story")]),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(collection.count().await.unwrap(), 2);

        // 재연결 시 데이터 유지
        let reopened = open(&temp_dir).await;
        assert_eq!(reopened.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_search_and_filter() {
        let temp_dir = TempDir::new().unwrap();
        let collection = open(&temp_dir).await;

        collection
            .add(&[
                record("S-1", "login authentication failing", &[("issue_type", "Bug")]),
                record("S-2", "database connection timeout", &[("issue_type", "Bug")]),
                record("S-3", "dark mode for mobile app", &[("issue_type", "Story")]),
            ])
            .await
            .unwrap();

        let hits = collection
            .query("database timeout", 2, &MetadataFilter::new())
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 2);
        assert_eq!(hits[0].id, "S-2");

        let filter = MetadataFilter::new().with("issue_type", "Bug");
        let hits = collection.query("", 20, &filter).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.metadata["issue_type"] == "Bug"));

        let sample = collection.get(2).await.unwrap();
        assert_eq!(sample.len(), 2);
    }
}
