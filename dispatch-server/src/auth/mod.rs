//! Bearer JWT authentication
//!
//! HTTP routes carry `Authorization: Bearer <JWT>`; WebSocket routes read
//! `?token=` because browsers cannot set headers on the upgrade request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Rider,
    Sales,
    Admin,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user or employee id
    pub sub: String,
    pub role: Role,
    pub name: String,
    /// Employee code for staff tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated caller extracted from JWT
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub role: Role,
    pub name: String,
    pub employee_code: Option<String>,
}

impl Identity {
    /// Employee code, or the operator name for tokens without one
    pub fn operator(&self) -> String {
        self.employee_code
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn require_code(&self) -> Result<&str, AppError> {
        self.employee_code
            .as_deref()
            .ok_or_else(|| AppError::forbidden("Token carries no employee code"))
    }
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Sign a token; issuance proper lives outside this service
pub fn create_token(
    id: i64,
    role: Role,
    name: &str,
    code: Option<&str>,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: id.to_string(),
        role,
        name: name.to_string(),
        code: code.map(str::to_string),
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decode and validate a token into an identity
pub fn verify_token(token: &str, secret: &str) -> Result<Identity, AppError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    let id = data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::invalid_token("Token subject is not an id"))?;
    Ok(Identity {
        id,
        role: data.claims.role,
        name: data.claims.name,
        employee_code: data.claims.code,
    })
}

/// Check a verified identity against the roles a route group admits
pub fn authorize(identity: &Identity, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AppError::with_message(
            ErrorCode::RoleRequired,
            format!("Role {:?} may not access this resource", identity.role),
        ))
    }
}

/// Route-group gate: verifies the bearer token and inserts [`Identity`]
pub async fn require_roles(
    State((state, allowed)): State<(AppState, &'static [Role])>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::not_authenticated)?
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format"))?;

    let identity = verify_token(token, &state.jwt_secret)?;
    authorize(&identity, allowed)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip_carries_role_and_code() {
        let token = create_token(17, Role::Rider, "Ali", Some("R017"), SECRET).unwrap();
        let identity = verify_token(&token, SECRET).unwrap();
        assert_eq!(identity.id, 17);
        assert_eq!(identity.role, Role::Rider);
        assert_eq!(identity.employee_code.as_deref(), Some("R017"));
        assert_eq!(identity.operator(), "R017");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(1, Role::Admin, "root", None, SECRET).unwrap();
        let err = verify_token(&token, "other").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn role_gate() {
        let identity = Identity {
            id: 3,
            role: Role::Customer,
            name: "c".into(),
            employee_code: None,
        };
        assert!(authorize(&identity, &[Role::Customer]).is_ok());
        let err = authorize(&identity, &[Role::Admin]).unwrap_err();
        assert_eq!(err.http_status(), http::StatusCode::FORBIDDEN);
        assert!(identity.require_code().is_err());
        assert_eq!(identity.operator(), "c");
    }
}
