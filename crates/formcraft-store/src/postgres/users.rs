use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use formcraft_core::{normalize_email, Page, PageRequest, User};

use super::rows::{to_count, user_columns, user_from_row};
use super::PgStore;
use crate::error::{Result, StoreError};
use crate::traits::{removes_last_owner, UserRepository};

pub(super) async fn insert_user(conn: &mut PgConnection, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, tenant_id, email, name, role, password_hash, is_active, last_login_at, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(user.id)
    .bind(user.tenant_id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.last_login_at)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_user(conn: &mut PgConnection, user: &User) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET name = $3, role = $4, is_active = $5, password_hash = $6 \
         WHERE tenant_id = $1 AND id = $2",
    )
    .bind(user.tenant_id)
    .bind(user.id)
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(&user.password_hash)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("user"));
    }
    Ok(())
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut tx = self.scoped(user.tenant_id).await?;
        insert_user(&mut *tx, user).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, tenant_id: Uuid, id: Uuid) -> Result<User> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("user"))?;
        tx.commit().await?;
        user_from_row(&row)
    }

    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>> {
        let mut tx = self.scoped(tenant_id).await?;
        let row = sqlx::query(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE tenant_id = $1 AND email = $2"
        ))
        .bind(tenant_id)
        .bind(normalize_email(email))
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<User>> {
        let mut tx = self.scoped(tenant_id).await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;
        let rows = sqlx::query(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE tenant_id = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3"
        ))
        .bind(tenant_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        let users = rows.iter().map(user_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(users, to_count(total), page))
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut tx = self.scoped(user.tenant_id).await?;
        write_user(&mut *tx, user).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_user_keeping_owner(&self, user: &User) -> Result<()> {
        let mut tx = self.scoped(user.tenant_id).await?;
        // Row locks serialize concurrent demotions of different owners.
        let owners: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users WHERE tenant_id = $1 AND role = 'owner' AND is_active ORDER BY id FOR UPDATE",
        )
        .bind(user.tenant_id)
        .fetch_all(&mut *tx)
        .await?;
        if removes_last_owner(&owners, user) {
            return Err(StoreError::LastOwner);
        }
        write_user(&mut *tx, user).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_active_owners(&self, tenant_id: Uuid) -> Result<u64> {
        let mut tx = self.scoped(tenant_id).await?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND role = 'owner' AND is_active",
        )
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(to_count(count))
    }

    async fn record_login(&self, tenant_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.scoped(tenant_id).await?;
        sqlx::query("UPDATE users SET last_login_at = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
