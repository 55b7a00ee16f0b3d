use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use formcraft_core::{ExportJob, Page, PageRequest, ToolRegistryEntry};

use super::rows::{export_columns, export_from_row, to_count, tool_columns, tool_from_row};
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::{ExportRepository, ToolRepository};

#[async_trait]
impl ToolRepository for PgStore {
    async fn create_tool(&self, tool: &ToolRegistryEntry) -> Result<()> {
        let mut tx = self.scoped(tool.tenant_id).await?;
        sqlx::query(
            "INSERT INTO tools (id, tenant_id, form_id, name, slug, description, version, config, status, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(tool.id)
        .bind(tool.tenant_id)
        .bind(tool.form_id)
        .bind(&tool.name)
        .bind(&tool.slug)
        .bind(&tool.description)
        .bind(&tool.version)
        .bind(Json(&tool.config))
        .bind(tool.status.as_str())
        .bind(tool.created_at)
        .bind(tool.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_tool(&self, tenant_id: Uuid, id: Uuid) -> Result<ToolRegistryEntry> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            tool_columns!(),
            " FROM tools WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("tool"))?;
        tx.commit().await?;
        tool_from_row(&row)
    }

    async fn list_tools(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<ToolRegistryEntry>> {
        let mut tx = self.scoped(tenant_id).await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tools WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            tool_columns!(),
            " FROM tools WHERE tenant_id = $1 ORDER BY name, id LIMIT $2 OFFSET $3"
        ))
        .bind(tenant_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        let tools = rows.iter().map(tool_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(tools, to_count(total), page))
    }

    async fn update_tool(&self, tool: &ToolRegistryEntry) -> Result<()> {
        let mut tx = self.scoped(tool.tenant_id).await?;
        let result = sqlx::query(
            "UPDATE tools SET form_id = $3, name = $4, slug = $5, description = $6, version = $7, \
             config = $8, status = $9 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tool.tenant_id)
        .bind(tool.id)
        .bind(tool.form_id)
        .bind(&tool.name)
        .bind(&tool.slug)
        .bind(&tool.description)
        .bind(&tool.version)
        .bind(Json(&tool.config))
        .bind(tool.status.as_str())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("tool"));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_tool(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.scoped(tenant_id).await?;
        let result = sqlx::query("DELETE FROM tools WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("tool"));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ExportRepository for PgStore {
    async fn create_export(&self, job: &ExportJob) -> Result<()> {
        let mut tx = self.scoped(job.tenant_id).await?;
        sqlx::query(
            "INSERT INTO export_jobs (id, tenant_id, tool_id, requested_by, status, current_step, total_steps, \
             step_label, package_path, error, created_at, started_at, finished_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(job.id)
        .bind(job.tenant_id)
        .bind(job.tool_id)
        .bind(job.requested_by)
        .bind(job.status.as_str())
        .bind(job.current_step as i32)
        .bind(job.total_steps as i32)
        .bind(&job.step_label)
        .bind(&job.package_path)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_export(&self, tenant_id: Uuid, id: Uuid) -> Result<ExportJob> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            export_columns!(),
            " FROM export_jobs WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("export job"))?;
        tx.commit().await?;
        export_from_row(&row)
    }

    async fn list_exports(&self, tenant_id: Uuid, tool_id: Option<Uuid>, page: PageRequest) -> Result<Page<ExportJob>> {
        let mut tx = self.scoped(tenant_id).await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM export_jobs WHERE tenant_id = $1 AND ($2::uuid IS NULL OR tool_id = $2)",
        )
        .bind(tenant_id)
        .bind(tool_id)
        .fetch_one(&mut *tx)
        .await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            export_columns!(),
            " FROM export_jobs WHERE tenant_id = $1 AND ($2::uuid IS NULL OR tool_id = $2) \
             ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        ))
        .bind(tenant_id)
        .bind(tool_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        let jobs = rows.iter().map(export_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(jobs, to_count(total), page))
    }

    async fn update_export(&self, job: &ExportJob) -> Result<()> {
        let mut tx = self.scoped(job.tenant_id).await?;
        let result = sqlx::query(
            "UPDATE export_jobs SET status = $3, current_step = $4, total_steps = $5, step_label = $6, \
             package_path = $7, error = $8, started_at = $9, finished_at = $10 \
             WHERE tenant_id = $1 AND id = $2 AND status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .bind(job.tenant_id)
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.current_step as i32)
        .bind(job.total_steps as i32)
        .bind(&job.step_label)
        .bind(&job.package_path)
        .bind(&job.error)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM export_jobs WHERE tenant_id = $1 AND id = $2)")
                .bind(job.tenant_id)
                .bind(job.id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                StoreError::Finished("export job")
            } else {
                StoreError::NotFound("export job")
            });
        }
        tx.commit().await?;
        Ok(())
    }
}
