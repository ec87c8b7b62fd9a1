//! HS256 session tokens.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use resource_gate_sdk::{AccessError, CallerIdentity, CallerResolver, Credentials, Grants};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Caller id.
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Grants,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl From<SessionClaims> for CallerIdentity {
    fn from(claims: SessionClaims) -> Self {
        CallerIdentity::new(claims.sub, claims.role).with_grants(claims.permissions)
    }
}

pub struct JwtCallerResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtCallerResolver {
    #[must_use]
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;
        if let Some(issuer) = issuer {
            // set_issuer alone only checks `iss` when the token carries one
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// # Errors
    /// Returns the decoding error for malformed, expired or wrongly signed tokens.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        decode::<SessionClaims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

#[async_trait]
impl CallerResolver for JwtCallerResolver {
    async fn current_caller(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<CallerIdentity>, AccessError> {
        let Some(token) = credentials.bearer.as_deref() else {
            return Ok(None);
        };
        match self.validate(token) {
            Ok(claims) => Ok(Some(claims.into())),
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected");
                Err(AccessError::AuthenticationRequired)
            }
        }
    }
}
