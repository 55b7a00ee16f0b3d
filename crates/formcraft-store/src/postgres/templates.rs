use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use formcraft_core::{FormTemplate, TemplateCategory};

use super::rows::{template_columns, template_from_row};
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::TemplateRepository;

async fn insert_template(conn: &mut PgConnection, template: &FormTemplate) -> Result<()> {
    sqlx::query(
        "INSERT INTO form_templates (id, tenant_id, name, description, category, business_logic, schema, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(template.id)
    .bind(template.tenant_id)
    .bind(&template.name)
    .bind(&template.description)
    .bind(template.category.as_str())
    .bind(Json(&template.business_logic))
    .bind(Json(&template.schema))
    .bind(template.created_at)
    .bind(template.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl TemplateRepository for PgStore {
    async fn create_template(&self, template: &FormTemplate) -> Result<()> {
        let tenant_id = template
            .tenant_id
            .ok_or_else(|| StoreError::InvalidData("tenant template needs a tenant".to_string()))?;
        let mut tx = self.scoped(tenant_id).await?;
        insert_template(&mut *tx, template).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_template(&self, tenant_id: Uuid, id: Uuid) -> Result<FormTemplate> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            template_columns!(),
            " FROM form_templates WHERE id = $2 AND (tenant_id IS NULL OR tenant_id = $1)"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("template"))?;
        tx.commit().await?;
        template_from_row(&row)
    }

    async fn list_templates(&self, tenant_id: Uuid, category: Option<TemplateCategory>) -> Result<Vec<FormTemplate>> {
        let mut tx = self.scoped(tenant_id).await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            template_columns!(),
            " FROM form_templates WHERE (tenant_id IS NULL OR tenant_id = $1) \
             AND ($2::text IS NULL OR category = $2) \
             ORDER BY tenant_id NULLS FIRST, name"
        ))
        .bind(tenant_id)
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.iter().map(template_from_row).collect()
    }

    async fn insert_system_template(&self, template: &FormTemplate) -> Result<bool> {
        // No tenant context: only system rows are visible and writable.
        let mut tx = self.pool.begin().await?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM form_templates WHERE tenant_id IS NULL AND name = $1)",
        )
        .bind(&template.name)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            tx.commit().await?;
            return Ok(false);
        }
        let mut system = template.clone();
        system.tenant_id = None;
        insert_template(&mut *tx, &system).await?;
        tx.commit().await?;
        Ok(true)
    }
}
