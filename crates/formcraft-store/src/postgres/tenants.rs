use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use formcraft_core::{Tenant, User};

use super::rows::{tenant_columns, tenant_from_row};
use super::users::insert_user;
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::TenantRepository;

#[async_trait]
impl TenantRepository for PgStore {
    async fn create_tenant_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<()> {
        // The owner insert is checked by RLS, so the transaction is scoped
        // to the tenant being created.
        let mut tx = self.scoped(tenant.id).await?;
        sqlx::query(
            "INSERT INTO tenants (id, name, slug, plan, features, isolation, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.plan.as_str())
        .bind(Json(&tenant.features))
        .bind(Json(&tenant.isolation))
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&mut *tx)
        .await?;
        insert_user(&mut *tx, owner).await?;
        tx.commit().await?;
        tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant created");
        Ok(())
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Tenant> {
        let row = sqlx::query(concat!("SELECT ", tenant_columns!(), " FROM tenants WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("tenant"))?;
        tenant_from_row(&row)
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query(concat!("SELECT ", tenant_columns!(), " FROM tenants WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant> {
        let row = sqlx::query(concat!(
            "UPDATE tenants SET name = $2, plan = $3, features = $4, isolation = $5 \
             WHERE id = $1 RETURNING ",
            tenant_columns!()
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(tenant.plan.as_str())
        .bind(Json(&tenant.features))
        .bind(Json(&tenant.isolation))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("tenant"))?;
        tenant_from_row(&row)
    }
}
