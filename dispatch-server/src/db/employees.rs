//! Employee lookups (riders, salespeople)

use sqlx::MySqlPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Employee {
    pub id: i64,
    pub employee_code: String,
    pub name: String,
    pub phone: Option<String>,
}

pub async fn find_active(pool: &MySqlPool, id: i64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, employee_code, name, phone FROM employees WHERE id = ? AND is_active = TRUE",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
