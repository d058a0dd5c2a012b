//! Id tokens and the users they describe.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

#[derive(Debug, Deserialize)]
struct Claims {
    oid: Option<String>,
    sub: Option<String>,
    exp: i64,
    #[serde(default)]
    roles: Vec<String>,
    upn: Option<String>,
    preferred_username: Option<String>,
    name: Option<String>,
    nonce: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Decoded id token. Signature verification is the identity provider's concern.
pub struct AuthToken {
    /// Subject object id.
    pub id: String,
    /// Expiry instant.
    pub expiration: DateTime<Utc>,
    /// Role claims.
    pub roles: Vec<String>,
    /// User principal name.
    pub upn: String,
    /// Display name.
    pub name: String,
    /// Nonce echoed by the identity provider.
    pub nonce: Option<String>,
    /// The encoded token sent as bearer.
    pub original_token: String,
}

impl AuthToken {
    /// Decodes the claims of a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when the token is not a JWT or lacks an expiry.
    pub fn parse(jwt: &str) -> Result<Self, AuthError> {
        let payload = jwt
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::InvalidToken("missing payload segment".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        let claims: Claims =
            serde_json::from_slice(&bytes).map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        let expiration = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken(format!("exp {} out of range", claims.exp)))?;

        Ok(Self {
            id: claims.oid.or(claims.sub).unwrap_or_default(),
            expiration,
            roles: claims.roles,
            upn: claims
                .upn
                .or(claims.preferred_username)
                .unwrap_or_default(),
            name: claims.name.unwrap_or_default(),
            nonce: claims.nonce,
            original_token: jwt.to_string(),
        })
    }

    /// Returns whether the token is unexpired now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Returns whether the token is unexpired at `now`. No clock skew is allowed.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }

    /// Returns the user the token describes.
    pub fn to_user(&self) -> AuthUser {
        AuthUser {
            id: self.id.clone(),
            full_name: self.name.clone(),
            upn: self.upn.clone(),
            roles: self.roles.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Signed-in user accumulated across every app token.
pub struct AuthUser {
    /// Object id.
    pub id: String,
    /// Display name.
    pub full_name: String,
    /// User principal name.
    pub upn: String,
    /// Roles from every token seen.
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Returns this user with the roles of `other` added.
    pub fn merge_with(&self, other: &AuthUser) -> AuthUser {
        let mut roles = self.roles.clone();
        for role in &other.roles {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
        AuthUser {
            roles,
            ..self.clone()
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
