//! rider_locations_history table

use shared::models::RiderLocation;
use sqlx::MySqlPool;

pub async fn append(pool: &MySqlPool, location: &RiderLocation) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO rider_locations_history (rider_id, latitude, longitude, accuracy, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(location.rider_id)
    .bind(location.lat)
    .bind(location.lng)
    .bind(location.accuracy)
    .bind(location.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}
