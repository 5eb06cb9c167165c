use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{ErrorMessage, HttpError},
    models::usermodel::UserRole,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    DeleteAccount,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub id: i64,
    pub role: UserRole,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

pub fn create_token(
    user_id: i64,
    role: UserRole,
    kind: TokenKind,
    secret: &[u8],
    expires_in_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if secret.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::minutes(expires_in_minutes)).timestamp() as usize;

    // single-use tokens carry an id the deletion tracker can burn
    let jti = match kind {
        TokenKind::DeleteAccount => Some(uuid::Uuid::new_v4().to_string()),
        _ => None,
    };

    let claims = TokenClaims {
        id: user_id,
        role,
        kind,
        iat,
        exp,
        jti,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token<T: Into<String>>(
    token: T,
    secret: &[u8],
    expected: TokenKind,
) -> Result<TokenClaims, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) if token.claims.kind == expected => Ok(token.claims),
        _ => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn issue_pair(
    user_id: i64,
    role: UserRole,
    access_secret: &[u8],
    access_maxage: i64,
    refresh_secret: &[u8],
    refresh_maxage: i64,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access_token: create_token(user_id, role, TokenKind::Access, access_secret, access_maxage)?,
        refresh_token: create_token(user_id, role, TokenKind::Refresh, refresh_secret, refresh_maxage)?,
    })
}

/// Access and refresh tokens signed with the configured secrets and lifetimes.
pub fn issue_session(
    config: &Config,
    user_id: i64,
    role: UserRole,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    issue_pair(
        user_id,
        role,
        config.jwt_secret.as_bytes(),
        config.jwt_maxage,
        config.jwt_refresh_secret.as_bytes(),
        config.jwt_refresh_maxage,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_roundtrip_carries_id_and_role() {
        let token = create_token(42, UserRole::Trucker, TokenKind::Access, b"secret", 10).unwrap();
        let claims = decode_token(token, b"secret", TokenKind::Access).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.role, UserRole::Trucker);
        assert!(claims.jti.is_none());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let pair = issue_pair(7, UserRole::Customer, b"access", 10, b"refresh", 100).unwrap();
        assert!(decode_token(pair.refresh_token.clone(), b"refresh", TokenKind::Refresh).is_ok());
        assert!(decode_token(pair.refresh_token.clone(), b"access", TokenKind::Access).is_err());
        assert!(decode_token(pair.refresh_token, b"refresh", TokenKind::Access).is_err());
    }

    #[test]
    fn deletion_tokens_carry_a_jti() {
        let token = create_token(1, UserRole::Customer, TokenKind::DeleteAccount, b"s", 15).unwrap();
        let claims = decode_token(token, b"s", TokenKind::DeleteAccount).unwrap();
        assert!(claims.jti.is_some());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(1, UserRole::Admin, TokenKind::Access, b"s", -10).unwrap();
        assert!(decode_token(token, b"s", TokenKind::Access).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(create_token(1, UserRole::Admin, TokenKind::Access, b"", 10).is_err());
    }
}
