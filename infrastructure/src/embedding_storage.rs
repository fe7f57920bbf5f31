use domain::models::{
    Chunk, ChunkId, DocumentId, EmbeddingProfile, EmbeddingVector, IndexEntry, Metadata,
    SimilarityMetric,
};
use domain::{RagError, Result};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;

/// SQLite snapshot of a vector store: its profile plus every entry in insertion order.
pub struct EmbeddingStorage {
    conn: Connection,
}

fn storage_err(err: impl std::fmt::Display) -> RagError {
    RagError::Storage(err.to_string())
}

impl EmbeddingStorage {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }
        let conn = Connection::open(db_path).map_err(storage_err)?;
        Self::setup_db(&conn).map_err(storage_err)?;
        Ok(Self { conn })
    }

    fn setup_db(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            CREATE TABLE IF NOT EXISTS profile (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS embeddings (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                document_id TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                vector BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_embeddings_document ON embeddings(document_id);
        ",
        )
    }

    /// Replaces whatever the file held before.
    pub fn save(&self, profile: &EmbeddingProfile, entries: &[IndexEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction().map_err(storage_err)?;
        tx.execute_batch("DELETE FROM embeddings; DELETE FROM profile;")
            .map_err(storage_err)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO profile (key, value) VALUES (?1, ?2)")
                .map_err(storage_err)?;
            stmt.execute(params!["model", profile.model]).map_err(storage_err)?;
            stmt.execute(params!["metric", profile.metric.as_str()])
                .map_err(storage_err)?;
            if let Some(dimensions) = profile.dimensions {
                stmt.execute(params!["dimensions", dimensions.to_string()])
                    .map_err(storage_err)?;
            }

            let mut stmt = tx
                .prepare(
                    "INSERT INTO embeddings (id, position, document_id, start_offset, text, metadata, vector)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(storage_err)?;
            for (position, entry) in entries.iter().enumerate() {
                let vector_bytes = serde_json::to_vec(&entry.vector.values).map_err(storage_err)?;
                let metadata = serde_json::to_string(&entry.chunk.metadata).map_err(storage_err)?;
                stmt.execute(params![
                    entry.chunk.id.0,
                    position as i64,
                    entry.chunk.source_document_id.0,
                    entry.chunk.start_offset as i64,
                    entry.chunk.content,
                    metadata,
                    vector_bytes
                ])
                .map_err(storage_err)?;
            }
        }
        tx.commit().map_err(storage_err)?;
        Ok(())
    }

    /// `None` when the file has never been written.
    pub fn load_profile(&self) -> Result<Option<EmbeddingProfile>> {
        let get = |key: &str| -> Result<Option<String>> {
            self.conn
                .query_row("SELECT value FROM profile WHERE key = ?1", [key], |row| row.get(0))
                .optional()
                .map_err(storage_err)
        };
        let Some(model) = get("model")? else {
            return Ok(None);
        };
        let metric: SimilarityMetric = get("metric")?
            .ok_or_else(|| storage_err("snapshot has no similarity metric"))?
            .parse()?;
        let dimensions = get("dimensions")?
            .map(|raw| raw.parse::<usize>().map_err(storage_err))
            .transpose()?;
        Ok(Some(EmbeddingProfile {
            model,
            dimensions,
            metric,
        }))
    }

    pub fn load_entries(&self) -> Result<Vec<IndexEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, document_id, start_offset, text, metadata, vector
                 FROM embeddings ORDER BY position",
            )
            .map_err(storage_err)?;
        let mut rows = stmt.query([]).map_err(storage_err)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().map_err(storage_err)? {
            let id: String = row.get(0).map_err(storage_err)?;
            let document_id: String = row.get(1).map_err(storage_err)?;
            let start_offset: i64 = row.get(2).map_err(storage_err)?;
            let text: String = row.get(3).map_err(storage_err)?;
            let metadata: String = row.get(4).map_err(storage_err)?;
            let vector_bytes: Vec<u8> = row.get(5).map_err(storage_err)?;

            let metadata: Metadata = serde_json::from_str(&metadata).map_err(storage_err)?;
            let values: Vec<f32> = serde_json::from_slice(&vector_bytes).map_err(storage_err)?;
            let chunk_id = ChunkId(id);
            entries.push(IndexEntry {
                chunk: Chunk {
                    id: chunk_id.clone(),
                    content: text,
                    start_offset: usize::try_from(start_offset).map_err(storage_err)?,
                    source_document_id: DocumentId(document_id),
                    metadata,
                },
                vector: EmbeddingVector { chunk_id, values },
            });
        }
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))
            .map_err(storage_err)?;
        Ok(count as usize)
    }
}
