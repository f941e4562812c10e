//! API handlers

use axum::Json;
use serde::Serialize;

use crate::auth::VerifiedIdentity;

/// Liveness check
pub async fn hello() -> Json<HelloResponse> {
    Json(HelloResponse {
        msg: "Hello World!".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub msg: String,
}

/// Return the verified caller's subject identifier
pub async fn user_id(identity: VerifiedIdentity) -> Json<UserIdResponse> {
    tracing::debug!(uid = %identity.uid(), "Resolved caller identity");

    Json(UserIdResponse {
        id: identity.uid().to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct UserIdResponse {
    pub id: String,
}
