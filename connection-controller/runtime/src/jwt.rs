//! Bearer tokens for browser sessions.
//!
//! Tokens are HS256-signed with a key shared with the workspace
//! authentication proxy, which verifies them on the bearer-auth endpoint.

use crate::core::{SignToken, TokenScope};
use anyhow::{ensure, Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

pub const DEFAULT_ISSUER: &str = "workspaces-auth";
pub const DEFAULT_AUDIENCE: &str = "workspace-users";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    #[serde(rename = "User", default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(rename = "Groups", default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    #[serde(rename = "Uid", default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    #[serde(rename = "Extra", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,

    #[serde(rename = "Path", default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(rename = "Domain", default, skip_serializing_if = "String::is_empty")]
    pub domain: String,

    #[serde(rename = "TokenType", default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,

    #[serde(rename = "SkipRefresh", default, skip_serializing_if = "is_false")]
    pub skip_refresh: bool,
}

#[derive(Clone)]
pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
    lifetime_secs: i64,
}

fn is_false(b: &bool) -> bool {
    !*b
}

// === impl JwtSigner ===

impl JwtSigner {
    pub fn new(
        key: &[u8],
        issuer: impl Into<String>,
        audience: impl Into<String>,
        lifetime: Duration,
    ) -> Result<Self> {
        ensure!(!key.is_empty(), "JWT signing key must not be empty");
        let lifetime_secs = i64::try_from(lifetime.as_secs())
            .with_context(|| format!("JWT lifetime {lifetime:?} is out of range"))?;
        Ok(Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            issuer: issuer.into(),
            audience: audience.into(),
            lifetime,
            lifetime_secs,
        })
    }

    pub fn claims(&self, scope: &TokenScope, now: i64) -> Claims {
        let subject = &scope.subject;
        Claims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: subject.username.clone(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.lifetime_secs),
            user: subject.username.clone(),
            groups: subject.groups.clone(),
            uid: subject.uid.clone().unwrap_or_default(),
            extra: subject.extra.clone(),
            path: scope.path.clone(),
            domain: scope.domain.clone(),
            token_type: scope.token_type.to_string(),
            skip_refresh: false,
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    /// Validates a token issued by this signer.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_nbf = true;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

impl SignToken for JwtSigner {
    fn sign_token(&self, scope: &TokenScope) -> Result<String> {
        let claims = self.claims(scope, chrono::Utc::now().timestamp());
        self.encode(&claims)
    }
}

impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigner")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
