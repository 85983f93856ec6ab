use crate::error::{MatflowError, Result};
use crate::storage::{BlobId, DocumentStore, IndexSpec, SortOrder};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

/// GridFS-style chunk size; blobs are split across rows of the
/// `blob_<name>_chunks` table.
const CHUNK_SIZE: usize = 255 * 1024;

/// Durable document store over SQLite. Each collection is a table of
/// JSON documents; indexes are expression indexes over `json_extract`;
/// blob collections are paired files/chunks tables.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        // In-memory SQLite is per-connection; a single connection keeps
        // every caller on the same database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                MatflowError::Storage(format!("Failed to connect to database: {}", e))
            })?;

        Ok(Self { pool })
    }

    async fn ensure_collection(&self, collection: &str) -> Result<String> {
        let table = format!("doc_{}", ident(collection)?);
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document JSON NOT NULL
            )
            "#,
            table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!("Failed to create collection {}: {}", collection, e))
        })?;
        Ok(table)
    }

    async fn ensure_blob_collection(&self, collection: &str) -> Result<(String, String)> {
        let name = ident(collection)?;
        let files = format!("blob_{}_files", name);
        let chunks = format!("blob_{}_chunks", name);

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                length INTEGER NOT NULL,
                uploaded_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            files
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!("Failed to create blob collection {}: {}", collection, e))
        })?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                file_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (file_id, seq)
            )
            "#,
            chunks
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!("Failed to create blob collection {}: {}", collection, e))
        })?;

        Ok((files, chunks))
    }
}

/// Collection names and field paths are interpolated into SQL, so they
/// are restricted to identifier-safe characters.
fn ident(name: &str) -> Result<&str> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(name)
    } else {
        Err(MatflowError::InvalidInput(format!(
            "invalid collection name: {}",
            name
        )))
    }
}

fn field_expr(field: &str) -> Result<String> {
    if field.is_empty()
        || !field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(MatflowError::InvalidInput(format!(
            "invalid field path: {}",
            field
        )));
    }
    Ok(format!("json_extract(document, '$.{}')", field))
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: &str, document: serde_json::Value) -> Result<()> {
        let table = self.ensure_collection(collection).await?;
        let json = serde_json::to_string(&document)?;

        sqlx::query(&format!("INSERT INTO {} (document) VALUES (?)", table))
            .bind(json)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MatflowError::Storage(format!(
                    "Failed to insert into {}: {}",
                    collection, e
                ))
            })?;
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let table = self.ensure_collection(collection).await?;
        let query = format!(
            "SELECT document FROM {} WHERE {} = ? LIMIT 1",
            table,
            field_expr(field)?
        );

        let query = sqlx::query(&query);
        let query = match value {
            serde_json::Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            // SQLite integers are i64; a u64 beyond that range cannot be
            // matched exactly, so refuse rather than compare through a
            // lossy f64.
            serde_json::Value::Number(n) if n.is_u64() => {
                return Err(MatflowError::InvalidInput(format!(
                    "integer {} exceeds the indexable range",
                    n
                )));
            }
            serde_json::Value::Number(n) => query.bind(n.as_f64()),
            serde_json::Value::String(s) => query.bind(s.clone()),
            serde_json::Value::Bool(b) => query.bind(*b as i64),
            other => query.bind(other.to_string()),
        };

        let row = query.fetch_optional(&self.pool).await.map_err(|e| {
            MatflowError::Storage(format!("Failed to query {}: {}", collection, e))
        })?;

        match row {
            Some(row) => {
                let json: String = row.get("document");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_all(&self, collection: &str) -> Result<u64> {
        let table = self.ensure_collection(collection).await?;
        let result = sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MatflowError::Storage(format!("Failed to clear {}: {}", collection, e))
            })?;
        Ok(result.rows_affected())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        let table = self.ensure_collection(collection).await?;

        let columns: Vec<String> = index
            .fields
            .iter()
            .map(|(field, order)| {
                let dir = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                Ok(format!("{} {}", field_expr(field)?, dir))
            })
            .collect::<Result<_>>()?;

        let unique = if index.unique { "UNIQUE " } else { "" };
        sqlx::query(&format!(
            r#"CREATE {}INDEX IF NOT EXISTS "idx_{}_{}" ON {} ({})"#,
            unique,
            collection,
            index.name(),
            table,
            columns.join(", ")
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!(
                "Failed to create index {} on {}: {}",
                index.name(),
                collection,
                e
            ))
        })?;
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<String>> {
        let table = self.ensure_collection(collection).await?;
        let prefix = format!("idx_{}_", collection);

        let rows = sqlx::query(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'index' AND tbl_name = ? AND name LIKE 'idx_%'
            ORDER BY name
            "#,
        )
        .bind(&table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!("Failed to list indexes on {}: {}", collection, e))
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let name: String = row.get("name");
                name.strip_prefix(&prefix).map(str::to_string)
            })
            .collect())
    }

    async fn put_blob(&self, collection: &str, data: &[u8]) -> Result<BlobId> {
        let (files, chunks) = self.ensure_blob_collection(collection).await?;
        let id = BlobId::generate();

        // Files row and chunks commit together; a failed write must not
        // leave a files row pointing at a partial chunk set.
        let mut tx = self.pool.begin().await.map_err(|e| {
            MatflowError::Storage(format!("Failed to store blob in {}: {}", collection, e))
        })?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, length) VALUES (?, ?)",
            files
        ))
        .bind(id.to_string())
        .bind(data.len() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!("Failed to store blob in {}: {}", collection, e))
        })?;

        for (seq, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            sqlx::query(&format!(
                "INSERT INTO {} (file_id, seq, data) VALUES (?, ?, ?)",
                chunks
            ))
            .bind(id.to_string())
            .bind(seq as i64)
            .bind(chunk)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                MatflowError::Storage(format!(
                    "Failed to store blob chunk in {}: {}",
                    collection, e
                ))
            })?;
        }

        tx.commit().await.map_err(|e| {
            MatflowError::Storage(format!("Failed to store blob in {}: {}", collection, e))
        })?;

        Ok(id)
    }

    async fn get_blob(&self, collection: &str, id: BlobId) -> Result<Vec<u8>> {
        let (files, chunks) = self.ensure_blob_collection(collection).await?;

        let file = sqlx::query(&format!("SELECT length FROM {} WHERE id = ?", files))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                MatflowError::Storage(format!("Failed to read blob from {}: {}", collection, e))
            })?;

        let length: i64 = match file {
            Some(row) => row.get("length"),
            None => {
                return Err(MatflowError::NotFound(format!(
                    "blob {} in collection {}",
                    id, collection
                )))
            }
        };

        let rows = sqlx::query(&format!(
            "SELECT data FROM {} WHERE file_id = ? ORDER BY seq",
            chunks
        ))
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            MatflowError::Storage(format!("Failed to read blob from {}: {}", collection, e))
        })?;

        let mut data = Vec::new();
        for row in rows {
            let chunk: Vec<u8> = row.get("data");
            data.extend_from_slice(&chunk);
        }

        // Reassembled bytes must match the recorded length; a missing
        // chunk reads back as corruption, never as a short blob.
        if data.len() as i64 != length {
            return Err(MatflowError::CorruptData(format!(
                "blob {} in collection {}: expected {} bytes, got {}",
                id,
                collection,
                length,
                data.len()
            )));
        }
        Ok(data)
    }

    async fn delete_blobs(&self, collection: &str) -> Result<()> {
        let (files, chunks) = self.ensure_blob_collection(collection).await?;
        for table in [chunks, files] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    MatflowError::Storage(format!(
                        "Failed to clear blob collection {}: {}",
                        collection, e
                    ))
                })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}
