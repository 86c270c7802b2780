//! PostgreSQL repository implementations.
//!
//! All queries are tenant-scoped: every read and write carries a
//! `tenant_id` predicate. Chunk writes are `INSERT ... ON CONFLICT DO
//! UPDATE` keyed by the deterministic chunk id, so retried ingestion
//! batches converge instead of duplicating rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use arca_core::{
    Chunk, ChunkRepository, Document, DocumentRepository, DocumentStatus, EncryptionKey, Error,
    KeyRepository, Result, Tenant, TenantRepository,
};

/// PostgreSQL metadata store facade.
///
/// One shared pool behind all repositories, mirroring the split of the
/// repository traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with default pool settings and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = crate::pool::connect(database_url, crate::pool::PoolConfig::default()).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_tenant_row(row: PgRow) -> Tenant {
    Tenant {
        id: row.get("id"),
        name: row.get("name"),
        namespace: row.get("namespace"),
        active_fingerprint: row.get("active_fingerprint"),
        created_at: row.get("created_at"),
    }
}

fn parse_key_row(row: PgRow) -> EncryptionKey {
    EncryptionKey {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        wrapped_key: row.get("wrapped_key"),
        fingerprint: row.get("fingerprint"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        rotated_at: row.get("rotated_at"),
    }
}

fn parse_document_row(row: PgRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        title: row.get("title"),
        content: row.get("content"),
        status: status
            .parse::<DocumentStatus>()
            .map_err(Error::Internal)?,
        chunk_count: row.get("chunk_count"),
        retry_count: row.get("retry_count"),
        last_error: row.get("last_error"),
        next_attempt_at: row.get("next_attempt_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn parse_chunk_row(row: PgRow) -> Chunk {
    Chunk {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        document_id: row.get("document_id"),
        sequence: row.get("sequence"),
        content: row.get("content"),
        encrypted_embedding: row.get("encrypted_embedding"),
        key_fingerprint: row.get("key_fingerprint"),
        section: row.get("section"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TenantRepository for PgStore {
    async fn insert(&self, name: &str) -> Result<Tenant> {
        let id = arca_core::new_v7();
        let row = sqlx::query(
            r#"
            INSERT INTO tenants (id, name, namespace)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Tenant::namespace_for(id))
        .fetch_one(&self.pool)
        .await?;
        Ok(parse_tenant_row(row))
    }

    async fn fetch(&self, tenant_id: Uuid) -> Result<Tenant> {
        sqlx::query("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .map(parse_tenant_row)
            .ok_or(Error::TenantNotFound(tenant_id))
    }

    async fn set_active_fingerprint(&self, tenant_id: Uuid, fingerprint: &str) -> Result<()> {
        let result = sqlx::query("UPDATE tenants SET active_fingerprint = $2 WHERE id = $1")
            .bind(tenant_id)
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::TenantNotFound(tenant_id));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyRepository for PgStore {
    async fn insert_active(&self, key: EncryptionKey) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE encryption_keys
            SET active = FALSE, rotated_at = now()
            WHERE tenant_id = $1 AND active
            "#,
        )
        .bind(key.tenant_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO encryption_keys
                (id, tenant_id, wrapped_key, fingerprint, active, created_at)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            "#,
        )
        .bind(key.id)
        .bind(key.tenant_id)
        .bind(&key.wrapped_key)
        .bind(&key.fingerprint)
        .bind(key.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_active(&self, tenant_id: Uuid) -> Result<Option<EncryptionKey>> {
        Ok(
            sqlx::query("SELECT * FROM encryption_keys WHERE tenant_id = $1 AND active")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?
                .map(parse_key_row),
        )
    }

    async fn fetch_by_fingerprint(
        &self,
        tenant_id: Uuid,
        fingerprint: &str,
    ) -> Result<Option<EncryptionKey>> {
        Ok(sqlx::query(
            "SELECT * FROM encryption_keys WHERE tenant_id = $1 AND fingerprint = $2",
        )
        .bind(tenant_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?
        .map(parse_key_row))
    }
}

#[async_trait]
impl DocumentRepository for PgStore {
    async fn insert(&self, tenant_id: Uuid, title: &str, content: &str) -> Result<Document> {
        let row = sqlx::query(
            r#"
            INSERT INTO documents (id, tenant_id, title, content, status)
            VALUES ($1, $2, $3, $4, 'uploaded')
            RETURNING *
            "#,
        )
        .bind(arca_core::new_v7())
        .bind(tenant_id)
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        parse_document_row(row)
    }

    async fn fetch(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document> {
        sqlx::query("SELECT * FROM documents WHERE id = $1 AND tenant_id = $2")
            .bind(document_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .map(parse_document_row)
            .transpose()?
            .ok_or(Error::DocumentNotFound(document_id))
    }

    async fn set_status(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = $3, updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(document_id)
        .bind(tenant_id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(document_id));
        }
        Ok(())
    }

    async fn set_chunk_count(&self, tenant_id: Uuid, document_id: Uuid, count: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET chunk_count = $3, updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(document_id)
        .bind(tenant_id)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET retry_count = retry_count + 1,
                last_error = $3,
                next_attempt_at = $4,
                status = CASE WHEN $4 IS NULL THEN 'failed' ELSE status END,
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(document_id)
        .bind(tenant_id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_for_retry(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'uploaded',
                retry_count = 0,
                last_error = NULL,
                next_attempt_at = NULL,
                updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(document_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_due(&self, limit: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            UPDATE documents
            SET next_attempt_at = now() + interval '60 seconds',
                updated_at = now()
            WHERE id IN (
                SELECT id FROM documents
                WHERE status NOT IN ('completed', 'failed')
                  AND (next_attempt_at IS NULL OR next_attempt_at <= now())
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_document_row).collect()
    }
}

#[async_trait]
impl ChunkRepository for PgStore {
    async fn upsert(&self, chunk: Chunk) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunks
                (id, tenant_id, document_id, sequence, content,
                 encrypted_embedding, key_fingerprint, section, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                encrypted_embedding = EXCLUDED.encrypted_embedding,
                key_fingerprint = EXCLUDED.key_fingerprint,
                section = EXCLUDED.section
            "#,
        )
        .bind(chunk.id)
        .bind(chunk.tenant_id)
        .bind(chunk.document_id)
        .bind(chunk.sequence)
        .bind(&chunk.content)
        .bind(&chunk.encrypted_embedding)
        .bind(&chunk.key_fingerprint)
        .bind(&chunk.section)
        .bind(chunk.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT * FROM chunks WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(parse_chunk_row).collect())
    }

    async fn fetch_by_sequences(
        &self,
        tenant_id: Uuid,
        positions: &[(Uuid, i32)],
    ) -> Result<Vec<Chunk>> {
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        let (document_ids, sequences): (Vec<Uuid>, Vec<i32>) =
            positions.iter().copied().unzip();
        let rows = sqlx::query(
            r#"
            SELECT c.* FROM chunks c
            JOIN unnest($2::uuid[], $3::int4[]) AS p(document_id, sequence)
              ON c.document_id = p.document_id AND c.sequence = p.sequence
            WHERE c.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(document_ids)
        .bind(sequences)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(parse_chunk_row).collect())
    }

    async fn ids_for_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM chunks
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY sequence
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }
}
