use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::model::{AdminClaims, Id, MemberClaims, ADMIN_ROLE};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for a hash that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Token is not valid")]
    Invalid,
}

/// Issues and checks the HS256 tokens handed to members and the admin.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    member_ttl: Duration,
    admin_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            member_ttl: Duration::hours(config.member_token_ttl_hours),
            admin_ttl: Duration::hours(config.admin_token_ttl_hours),
        }
    }

    pub fn issue_member(&self, member_id: &Id) -> Result<String> {
        let now = Utc::now();
        let claims = MemberClaims {
            sub: member_id.clone(),
            iat: now.timestamp(),
            exp: (now + self.member_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn issue_admin(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = AdminClaims {
            username: username.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.admin_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn verify_member(&self, token: &str) -> Result<MemberClaims, TokenError> {
        self.verify(token)
    }

    /// Checks the signature only; callers decide what a missing admin role means.
    pub fn verify_admin(&self, token: &str) -> Result<AdminClaims, TokenError> {
        self.verify(token)
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<C>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    #[cfg(test)]
    pub(crate) fn sign_for_test<C: Serialize>(&self, claims: &C) -> String {
        self.sign(claims).unwrap()
    }
}
