//! system_settings table

use sqlx::{MySqlConnection, MySqlPool};

pub async fn load_all(pool: &MySqlPool) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as("SELECT setting_key, setting_value FROM system_settings")
        .fetch_all(pool)
        .await
}

pub async fn upsert(
    conn: &mut MySqlConnection,
    key: &str,
    value: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO system_settings (setting_key, setting_value)
        VALUES (?, ?)
        ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}
