use async_trait::async_trait;
use uuid::Uuid;

use formcraft_core::{Page, PageRequest, ShortLink};

use super::rows::{link_columns, link_from_row, to_count};
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::ShortLinkRepository;

// short_links is outside RLS: codes resolve before any tenant is known.
// Tenant-facing queries filter on tenant_id themselves.

#[async_trait]
impl ShortLinkRepository for PgStore {
    async fn create_link(&self, link: &ShortLink) -> Result<()> {
        sqlx::query(
            "INSERT INTO short_links (id, tenant_id, code, target_url, form_id, clicks, expires_at, created_by, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(link.id)
        .bind(link.tenant_id)
        .bind(&link.code)
        .bind(&link.target_url)
        .bind(link.form_id)
        .bind(link.clicks)
        .bind(link.expires_at)
        .bind(link.created_by)
        .bind(link.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_links(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<ShortLink>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM short_links WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            link_columns!(),
            " FROM short_links WHERE tenant_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(tenant_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        let links = rows.iter().map(link_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(links, to_count(total), page))
    }

    async fn delete_link(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM short_links WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("short link"));
        }
        Ok(())
    }

    async fn resolve_link(&self, code: &str) -> Result<Option<ShortLink>> {
        let row = sqlx::query(concat!("SELECT ", link_columns!(), " FROM short_links WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(link_from_row).transpose()
    }

    async fn record_click(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE short_links SET clicks = clicks + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
