use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use formcraft_core::FormTheme;

use super::rows::{theme_columns, theme_from_row};
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::ThemeRepository;

/// Drop the default flag from every other theme of the tenant.
async fn clear_default(conn: &mut PgConnection, theme: &FormTheme) -> Result<()> {
    sqlx::query("UPDATE themes SET is_default = FALSE WHERE tenant_id = $1 AND is_default AND id <> $2")
        .bind(theme.tenant_id)
        .bind(theme.id)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl ThemeRepository for PgStore {
    async fn create_theme(&self, theme: &FormTheme) -> Result<()> {
        let mut tx = self.scoped(theme.tenant_id).await?;
        if theme.is_default {
            clear_default(&mut *tx, theme).await?;
        }
        sqlx::query(
            "INSERT INTO themes (id, tenant_id, name, desktop, mobile, is_default, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(theme.id)
        .bind(theme.tenant_id)
        .bind(&theme.name)
        .bind(Json(&theme.desktop))
        .bind(Json(&theme.mobile))
        .bind(theme.is_default)
        .bind(theme.created_at)
        .bind(theme.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_theme(&self, tenant_id: Uuid, id: Uuid) -> Result<FormTheme> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            theme_columns!(),
            " FROM themes WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("theme"))?;
        tx.commit().await?;
        theme_from_row(&row)
    }

    async fn list_themes(&self, tenant_id: Uuid) -> Result<Vec<FormTheme>> {
        let mut tx = self.scoped(tenant_id).await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            theme_columns!(),
            " FROM themes WHERE tenant_id = $1 ORDER BY is_default DESC, name"
        ))
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        rows.iter().map(theme_from_row).collect()
    }

    async fn update_theme(&self, theme: &FormTheme) -> Result<()> {
        let mut tx = self.scoped(theme.tenant_id).await?;
        if theme.is_default {
            clear_default(&mut *tx, theme).await?;
        }
        let result = sqlx::query(
            "UPDATE themes SET name = $3, desktop = $4, mobile = $5, is_default = $6 \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(theme.tenant_id)
        .bind(theme.id)
        .bind(&theme.name)
        .bind(Json(&theme.desktop))
        .bind(Json(&theme.mobile))
        .bind(theme.is_default)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("theme"));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_theme(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.scoped(tenant_id).await?;
        let result = sqlx::query("DELETE FROM themes WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("theme"));
        }
        tx.commit().await?;
        Ok(())
    }
}
