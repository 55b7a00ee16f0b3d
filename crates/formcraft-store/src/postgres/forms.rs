use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use formcraft_core::{Form, Page, PageRequest, Submission};

use super::rows::{form_columns, form_from_row, submission_columns, submission_from_row, to_count};
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::{FormFilter, FormRepository, SubmissionRepository};

/// Escape `LIKE` wildcards in user input.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl FormRepository for PgStore {
    async fn create_form(&self, form: &Form) -> Result<()> {
        let mut tx = self.scoped(form.tenant_id).await?;
        sqlx::query(
            "INSERT INTO forms (id, tenant_id, owner_id, title, description, slug, status, schema, theme_id, \
             template_id, published_at, deleted_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(form.id)
        .bind(form.tenant_id)
        .bind(form.owner_id)
        .bind(&form.title)
        .bind(&form.description)
        .bind(&form.slug)
        .bind(form.status.as_str())
        .bind(Json(&form.schema))
        .bind(form.theme_id)
        .bind(form.template_id)
        .bind(form.published_at)
        .bind(form.deleted_at)
        .bind(form.created_at)
        .bind(form.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_form(&self, tenant_id: Uuid, id: Uuid) -> Result<Form> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            form_columns!(),
            " FROM forms WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("form"))?;
        tx.commit().await?;
        form_from_row(&row)
    }

    async fn find_published_form(&self, tenant_id: Uuid, slug: &str) -> Result<Option<Form>> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            form_columns!(),
            " FROM forms WHERE tenant_id = $1 AND slug = $2 AND status = 'published' AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.as_ref().map(form_from_row).transpose()
    }

    async fn list_forms(&self, tenant_id: Uuid, filter: &FormFilter, page: PageRequest) -> Result<Page<Form>> {
        let status = filter.status.map(|s| s.as_str());
        let search = filter.search.as_deref().map(like_pattern);

        let mut tx = self.scoped(tenant_id).await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM forms WHERE tenant_id = $1 AND deleted_at IS NULL \
             AND ($2::text IS NULL OR status = $2) AND ($3::text IS NULL OR title ILIKE $3)",
        )
        .bind(tenant_id)
        .bind(status)
        .bind(&search)
        .fetch_one(&mut *tx)
        .await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            form_columns!(),
            " FROM forms WHERE tenant_id = $1 AND deleted_at IS NULL \
             AND ($2::text IS NULL OR status = $2) AND ($3::text IS NULL OR title ILIKE $3) \
             ORDER BY created_at DESC, id LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(status)
        .bind(&search)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        let forms = rows.iter().map(form_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(forms, to_count(total), page))
    }

    async fn update_form(&self, form: &Form) -> Result<()> {
        let mut tx = self.scoped(form.tenant_id).await?;
        let result = sqlx::query(
            "UPDATE forms SET title = $3, description = $4, slug = $5, status = $6, schema = $7, \
             theme_id = $8, published_at = $9 \
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(form.tenant_id)
        .bind(form.id)
        .bind(&form.title)
        .bind(&form.description)
        .bind(&form.slug)
        .bind(form.status.as_str())
        .bind(Json(&form.schema))
        .bind(form.theme_id)
        .bind(form.published_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("form"));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn soft_delete_form(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.scoped(tenant_id).await?;
        let result = sqlx::query(
            "UPDATE forms SET deleted_at = now() WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("form"));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn form_slug_exists(&self, tenant_id: Uuid, slug: &str) -> Result<bool> {
        let mut tx = self.scoped(tenant_id).await?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM forms WHERE tenant_id = $1 AND slug = $2 AND deleted_at IS NULL)",
        )
        .bind(tenant_id)
        .bind(slug)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(exists)
    }

    async fn count_forms(&self, tenant_id: Uuid) -> Result<u64> {
        let mut tx = self.scoped(tenant_id).await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM forms WHERE tenant_id = $1 AND deleted_at IS NULL")
                .bind(tenant_id)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(to_count(count))
    }
}

#[async_trait]
impl SubmissionRepository for PgStore {
    async fn create_submission(&self, submission: &Submission) -> Result<()> {
        let mut tx = self.scoped(submission.tenant_id).await?;
        sqlx::query(
            "INSERT INTO submissions (id, tenant_id, form_id, answers, outcome, submitted_at, client_ip) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(submission.id)
        .bind(submission.tenant_id)
        .bind(submission.form_id)
        .bind(Json(&submission.answers))
        .bind(Json(&submission.outcome))
        .bind(submission.submitted_at)
        .bind(&submission.client_ip)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_submissions(&self, tenant_id: Uuid, form_id: Uuid, page: PageRequest) -> Result<Page<Submission>> {
        let mut tx = self.scoped(tenant_id).await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE tenant_id = $1 AND form_id = $2")
            .bind(tenant_id)
            .bind(form_id)
            .fetch_one(&mut *tx)
            .await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            submission_columns!(),
            " FROM submissions WHERE tenant_id = $1 AND form_id = $2 \
             ORDER BY submitted_at DESC, id LIMIT $3 OFFSET $4"
        ))
        .bind(tenant_id)
        .bind(form_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        let items = rows.iter().map(submission_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, to_count(total), page))
    }

    async fn count_submissions(&self, tenant_id: Uuid, form_id: Uuid) -> Result<u64> {
        let mut tx = self.scoped(tenant_id).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE tenant_id = $1 AND form_id = $2")
            .bind(tenant_id)
            .bind(form_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(to_count(count))
    }

    async fn submissions_since(&self, tenant_id: Uuid, form_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Submission>> {
        let mut tx = self.scoped(tenant_id).await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            submission_columns!(),
            " FROM submissions WHERE tenant_id = $1 AND form_id = $2 AND submitted_at >= $3 \
             ORDER BY submitted_at, id"
        ))
        .bind(tenant_id)
        .bind(form_id)
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.iter().map(submission_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
