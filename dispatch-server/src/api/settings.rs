//! Fee parameter administration

use axum::Json;
use axum::extract::State;
use shared::error::AppError;
use std::collections::BTreeMap;

use crate::db;
use crate::error::{ApiResult, ok};
use crate::pricing::{self, FeeParameters};
use crate::state::AppState;

async fn fee_rows(state: &AppState) -> Result<BTreeMap<String, String>, sqlx::Error> {
    Ok(db::settings::load_all(&state.pool)
        .await?
        .into_iter()
        .filter(|(k, _)| pricing::is_fee_key(k))
        .collect())
}

/// Numbers and strings are both accepted as setting values
fn setting_value(key: &str, value: &serde_json::Value) -> Result<String, AppError> {
    match value {
        serde_json::Value::String(s) => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(AppError::validation(format!("{key} must be a number"))),
    }
}

/// GET /admin/settings/delivery-fee
pub async fn get_fee_settings(State(state): State<AppState>) -> ApiResult<BTreeMap<String, String>> {
    ok(fee_rows(&state).await?)
}

/// PUT /admin/settings/delivery-fee
///
/// The merged set must load cleanly before anything is written.
pub async fn update_fee_settings(
    State(state): State<AppState>,
    Json(body): Json<BTreeMap<String, serde_json::Value>>,
) -> ApiResult<BTreeMap<String, String>> {
    let mut changes = BTreeMap::new();
    for (key, value) in &body {
        if !pricing::is_fee_key(key) {
            return Err(AppError::validation(format!("{key} is not a fee setting")).into());
        }
        changes.insert(key.clone(), setting_value(key, value)?);
    }

    let mut merged = fee_rows(&state).await?;
    merged.extend(changes.clone());
    FeeParameters::from_settings(merged.clone())?;

    let mut tx = state.pool.begin().await?;
    for (key, value) in &changes {
        db::settings::upsert(&mut tx, key, value).await?;
    }
    tx.commit().await?;
    state.settings.invalidate().await;

    tracing::info!(keys = ?changes.keys().collect::<Vec<_>>(), "Fee settings updated");
    ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_accept_numbers_and_strings() {
        assert_eq!(setting_value("delivery_base_fee", &serde_json::json!(4.5)).unwrap(), "4.5");
        assert_eq!(setting_value("delivery_base_fee", &serde_json::json!(" 6 ")).unwrap(), "6");
        assert!(setting_value("delivery_base_fee", &serde_json::json!(true)).is_err());
    }
}
