//! Customers and their addresses

use shared::models::UserType;
use sqlx::{MySqlConnection, MySqlPool};

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i64,
    pub user_type: UserType,
    /// Salesperson bound to this customer
    pub sales_employee_code: Option<String>,
}

pub async fn find_customer(pool: &MySqlPool, id: i64) -> Result<Option<Customer>, sqlx::Error> {
    let row: Option<(i64, String, Option<String>)> =
        sqlx::query_as("SELECT id, user_type, sales_employee_code FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(id, user_type, sales_employee_code)| Customer {
        id,
        user_type: UserType::from_db(&user_type),
        sales_employee_code,
    }))
}

/// Salesperson bound to a customer at this moment
pub async fn sales_code(
    conn: &mut MySqlConnection,
    user_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT sales_employee_code FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.and_then(|(code,)| code).filter(|c| !c.is_empty()))
}

/// Settled orders of a customer, the one being settled excluded
pub async fn settled_order_count(
    conn: &mut MySqlConnection,
    user_id: i64,
    excluding_order_id: i64,
) -> Result<i64, sqlx::Error> {
    let (n,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE user_id = ? AND id <> ? AND settlement_date IS NOT NULL AND status <> 'cancelled'
        "#,
    )
    .bind(user_id)
    .bind(excluding_order_id)
    .fetch_one(conn)
    .await?;
    Ok(n)
}

/// Coordinates of a customer's address
pub async fn address_point(
    pool: &MySqlPool,
    user_id: i64,
    address_id: i64,
) -> Result<Option<Option<(f64, f64)>>, sqlx::Error> {
    let row: Option<(Option<f64>, Option<f64>)> =
        sqlx::query_as("SELECT latitude, longitude FROM addresses WHERE id = ? AND user_id = ?")
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(lat, lng)| lat.zip(lng)))
}

/// Addresses of orders still waiting for a rider
pub async fn pending_batch_points(
    pool: &MySqlPool,
    excluding_address_id: i64,
) -> Result<Vec<(f64, f64)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT a.latitude, a.longitude
        FROM orders o
        JOIN addresses a ON a.id = o.address_id
        WHERE o.status = 'pending_delivery'
          AND a.id <> ?
          AND a.latitude IS NOT NULL AND a.longitude IS NOT NULL
        "#,
    )
    .bind(excluding_address_id)
    .fetch_all(pool)
    .await
}
