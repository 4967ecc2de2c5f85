//! JWT authentication and the explicit actor context.
//!
//! Every service entry point takes an [`ActorContext`] argument rather than
//! reading an ambient request-scoped user: the context carries the actor's
//! role and company affiliation and is resolved once, at the HTTP boundary.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

/// Which side of the marketplace the actor acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Consumer,
    Supplier,
}

/// Identity of the caller, passed explicitly into services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub role: ActorRole,
    pub supplier_id: Option<Uuid>,
    pub consumer_id: Option<Uuid>,
}

impl ActorContext {
    pub fn consumer(user_id: Uuid, consumer_id: Uuid) -> Self {
        Self {
            user_id,
            role: ActorRole::Consumer,
            supplier_id: None,
            consumer_id: Some(consumer_id),
        }
    }

    pub fn supplier(user_id: Uuid, supplier_id: Uuid) -> Self {
        Self {
            user_id,
            role: ActorRole::Supplier,
            supplier_id: Some(supplier_id),
            consumer_id: None,
        }
    }

    /// The consumer company this actor purchases for, or `Forbidden`.
    pub fn require_consumer(&self) -> Result<Uuid, ServiceError> {
        match (self.role, self.consumer_id) {
            (ActorRole::Consumer, Some(id)) => Ok(id),
            _ => Err(ServiceError::Forbidden(
                "Only consumers can perform this action".to_string(),
            )),
        }
    }

    /// The supplier company this actor manages, or `Forbidden`.
    pub fn require_supplier(&self) -> Result<Uuid, ServiceError> {
        match (self.role, self.supplier_id) {
            (ActorRole::Supplier, Some(id)) => Ok(id),
            _ => Err(ServiceError::Forbidden(
                "Only suppliers can perform this action".to_string(),
            )),
        }
    }
}

/// JWT claims carried by bearer tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub role: String,
    pub supplier_id: Option<Uuid>,
    pub consumer_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues a signed bearer token for the given actor.
pub fn issue_token(
    secret: &str,
    expiration_secs: usize,
    actor: &ActorContext,
) -> Result<String, ServiceError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: actor.user_id.to_string(),
        role: actor.role.to_string(),
        supplier_id: actor.supplier_id,
        consumer_id: actor.consumer_id,
        iat: now,
        exp: now + expiration_secs as i64,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {e}")))
}

/// Verifies a bearer token and resolves the actor context.
pub fn verify_token(secret: &str, token: &str) -> Result<ActorContext, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;

    let claims = data.claims;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ServiceError::Unauthorized("invalid token subject".to_string()))?;
    let role = ActorRole::from_str(&claims.role)
        .map_err(|_| ServiceError::Unauthorized("unknown actor role".to_string()))?;

    Ok(ActorContext {
        user_id,
        role,
        supplier_id: claims.supplier_id,
        consumer_id: claims.consumer_id,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for ActorContext {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing authorization header".to_string())
            })?;

        let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("expected bearer authorization".to_string())
        })?;

        verify_token(&state.config.jwt_secret, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

    #[test]
    fn token_round_trip_preserves_actor() {
        let actor = ActorContext::consumer(Uuid::new_v4(), Uuid::new_v4());
        let token = issue_token(SECRET, 3600, &actor).unwrap();
        let resolved = verify_token(SECRET, &token).unwrap();
        assert_eq!(resolved, actor);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let actor = ActorContext::supplier(Uuid::new_v4(), Uuid::new_v4());
        let token = issue_token(SECRET, 3600, &actor).unwrap();
        let err = verify_token("another_secret_key_that_is_long_enough_xx", &token);
        assert!(matches!(err, Err(ServiceError::Unauthorized(_))));
    }

    #[test]
    fn role_gates() {
        let consumer = ActorContext::consumer(Uuid::new_v4(), Uuid::new_v4());
        assert!(consumer.require_consumer().is_ok());
        assert!(matches!(
            consumer.require_supplier(),
            Err(ServiceError::Forbidden(_))
        ));

        let supplier = ActorContext::supplier(Uuid::new_v4(), Uuid::new_v4());
        assert!(supplier.require_supplier().is_ok());
        assert!(matches!(
            supplier.require_consumer(),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
