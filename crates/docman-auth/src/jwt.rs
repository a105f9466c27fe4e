//! JWT token management

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AuthError;

/// Which half of a token pair a token is
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub user_id: Uuid,
    /// Privilege snapshot at issuance; absent reads as `false`
    #[serde(default)]
    pub is_master: bool,
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Access and refresh tokens minted by one login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    /// Create a new JWT manager; an empty secret is rejected
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSigningKey);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        })
    }

    /// Issue an access/refresh pair for a user
    pub fn issue_pair(&self, user_id: Uuid, is_master: bool) -> Result<TokenPair, AuthError> {
        self.issue_pair_at(user_id, is_master, Utc::now())
    }

    /// Issue a pair as if the current time were `now`
    pub fn issue_pair_at(
        &self,
        user_id: Uuid,
        is_master: bool,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        debug!("Issuing token pair for user: {}", user_id);

        Ok(TokenPair {
            access_token: self.sign(user_id, is_master, TokenKind::Access, now)?,
            refresh_token: self.sign(user_id, is_master, TokenKind::Refresh, now)?,
        })
    }

    fn sign(
        &self,
        user_id: Uuid,
        is_master: bool,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            user_id,
            is_master,
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Validate a JWT token and return claims.
    ///
    /// Bad signatures, malformed tokens and expiry all surface as `InvalidToken`.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            AuthError::InvalidToken
        })?;

        if token_data.claims.exp < Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }

    /// Validate a token presented to a protected route
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new access token with the same subject and privilege.
    ///
    /// The new token is stamped at least one second after its pair was
    /// issued, so it always expires later than the original access token.
    /// The refresh token itself is neither rotated nor invalidated.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.validate_token(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let now = Utc::now();
        let issued_at =
            DateTime::from_timestamp(claims.iat + 1, 0).map_or(now, |floor| now.max(floor));

        debug!("Refreshing access token for user: {}", claims.user_id);
        self.sign(claims.user_id, claims.is_master, TokenKind::Access, issued_at)
    }
}
