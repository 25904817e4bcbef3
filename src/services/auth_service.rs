use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    error::{AppError, AppResult},
};

/// Sign a bearer token for `user_id` carrying `role`.
pub fn issue_token(secret: &str, user_id: Uuid, role: &str, ttl: Duration) -> AppResult<String> {
    let claims = Claims::new(user_id, role, Utc::now(), ttl);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}
