//! Test fixtures for creating catalog data.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a catalog product. The admission trigger creates its pending
/// enrichment record.
pub async fn create_test_product(pool: &PgPool, url: &str, monthly_visits: Option<i64>) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO products (name, url, monthly_visits)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(format!("Test product {url}"))
    .bind(url)
    .bind(monthly_visits)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn delete_test_product(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
