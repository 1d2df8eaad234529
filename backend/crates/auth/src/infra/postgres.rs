//! PostgreSQL Document Store
//!
//! Documents live in one JSONB table, `documents(collection, key, body)`,
//! with `(collection, key)` as primary key. Unique document fields are
//! enforced by partial unique indexes created with
//! [`PgDocumentStore::ensure_unique_field`].

use platform::crypto::random_alphanumeric;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::domain::repository::{Document, DocumentStore, Filter, FilterOp, StoredDocument};
use crate::error::StoreError;

/// Length of store-assigned keys
const GENERATED_KEY_LENGTH: usize = 20;

const PRIMARY_KEY_CONSTRAINT: &str = "documents_pkey";

/// PostgreSQL-backed document store
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create (if missing) a partial unique index on `body ->> field` for one
    /// collection
    pub async fn ensure_unique_field(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let collection = checked_identifier(collection)?;
        let field = checked_identifier(field)?;
        let index = format!("documents_{}_{}_unique", collection, field).to_lowercase();

        // identifiers are validated above; DDL cannot take bind parameters
        let ddl = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {index} \
             ON documents ((body ->> '{field}')) \
             WHERE collection = '{collection}'"
        );
        sqlx::query(&ddl).execute(&self.pool).await?;

        tracing::info!(collection, field, "Unique document field ensured");
        Ok(())
    }

    fn map_write_error(collection: &str, key: &str, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return match db_err.constraint() {
                    Some(PRIMARY_KEY_CONSTRAINT) => StoreError::AlreadyExists {
                        collection: collection.to_string(),
                        key: key.to_string(),
                    },
                    other => StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field: other.unwrap_or("unknown").to_string(),
                    },
                };
            }
        }
        StoreError::Database(err)
    }
}

impl DocumentStore for PgDocumentStore {
    async fn get_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.find_matching(collection, &Filter::eq(field, value.clone()))
            .await
    }

    async fn get_by_key(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT key, body
            FROM documents
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DocumentRow::into_stored))
    }

    async fn insert(&self, collection: &str, body: Document) -> Result<String, StoreError> {
        let key = random_alphanumeric(GENERATED_KEY_LENGTH);

        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection)
        .bind(&key)
        .bind(Json(&body))
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(collection, &key, e))?;

        Ok(key)
    }

    async fn insert_at(
        &self,
        collection: &str,
        key: &str,
        body: Document,
    ) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (collection, key, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, key) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(Json(&body))
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(collection, key, e))?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn merge_update(
        &self,
        collection: &str,
        key: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET body = body || $3, updated_at = NOW()
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(Json(&partial))
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(collection, key, e))?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_by_key(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let deleted = match filter.op {
            FilterOp::Eq => {
                sqlx::query(
                    "DELETE FROM documents WHERE collection = $1 AND body -> $2 = $3",
                )
                .bind(collection)
                .bind(&filter.field)
                .bind(Json(&filter.value))
                .execute(&self.pool)
                .await?
            }
            FilterOp::Lt => {
                let Some(bound) = filter.value.as_f64() else {
                    return Ok(0);
                };
                sqlx::query(&format!(
                    "DELETE FROM documents WHERE collection = $1 AND {NUMERIC_LT}"
                ))
                .bind(collection)
                .bind(&filter.field)
                .bind(bound)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(deleted.rows_affected())
    }

    async fn find_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let rows = match filter.op {
            FilterOp::Eq => {
                sqlx::query_as::<_, DocumentRow>(
                    r#"
                    SELECT key, body
                    FROM documents
                    WHERE collection = $1 AND body -> $2 = $3
                    ORDER BY key
                    "#,
                )
                .bind(collection)
                .bind(&filter.field)
                .bind(Json(&filter.value))
                .fetch_all(&self.pool)
                .await?
            }
            FilterOp::Lt => {
                let Some(bound) = filter.value.as_f64() else {
                    return Ok(Vec::new());
                };
                sqlx::query_as::<_, DocumentRow>(&format!(
                    "SELECT key, body FROM documents WHERE collection = $1 AND {NUMERIC_LT} ORDER BY key"
                ))
                .bind(collection)
                .bind(&filter.field)
                .bind(bound)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(DocumentRow::into_stored).collect())
    }
}

/// `body[$2] < $3` for numeric fields; non-numeric values never match
const NUMERIC_LT: &str = "CASE WHEN jsonb_typeof(body -> $2) = 'number' \
     THEN (body ->> $2)::double precision < $3 ELSE FALSE END";

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct DocumentRow {
    key: String,
    body: Json<Document>,
}

impl DocumentRow {
    fn into_stored(self) -> StoredDocument {
        StoredDocument {
            key: self.key,
            body: self.body.0,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Accept `[A-Za-z0-9_]+` only, for names spliced into DDL
fn checked_identifier(name: &str) -> Result<&str, StoreError> {
    if !name.is_empty()
        && name.len() <= 24
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
