//! Signed bearer tokens.
//!
//! Both token kinds carry the user's email as subject; the `scope` claim keeps a
//! refresh token from being accepted where an access token is expected and vice versa.

use crate::server::controller::error::CustomError;
use crate::server::model::config::ServerConfig;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TokenScope {
    AccessToken,
    RefreshToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Claims {
    /// user email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub scope: TokenScope,
    /// random token id
    pub jti: String,
}

#[derive(Clone)]
pub(crate) struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_algorithm,
            config.access_token_ttl,
            config.refresh_token_ttl,
        )
    }

    pub fn issue(&self, email: &str, scope: TokenScope) -> Result<String, CustomError> {
        let ttl = match scope {
            TokenScope::AccessToken => self.access_ttl,
            TokenScope::RefreshToken => self.refresh_ttl,
        };
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            scope,
            jti: format!("{:016x}", OsRng.next_u64()),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| {
            error!("failed to encode token, {}", e);
            CustomError::Internal
        })
    }

    /// Decodes and checks a token. Bad signatures, expired tokens and tokens of
    /// another scope are all `Unauthorized`.
    pub fn verify(&self, token: &str, scope: TokenScope) -> Result<Claims, CustomError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(self.algorithm))
            .map_err(|e| {
                debug!("rejected token, {}", e);
                CustomError::Unauthorized
            })?;
        if data.claims.scope != scope {
            debug!("rejected token of scope {:?}", data.claims.scope);
            return Err(CustomError::Unauthorized);
        }
        Ok(data.claims)
    }
}
