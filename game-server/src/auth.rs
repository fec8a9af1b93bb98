use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use game_types::AuthUser;

/// Claims carried by an access token issued by the login service. The
/// gateway trusts these fully once the signature checks out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub exp: u64,
    pub username: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub elo: Option<i32>,
    #[serde(rename = "gamesPlayed")]
    pub games_played: Option<i32>,
    #[serde(rename = "isGuest")]
    pub is_guest: Option<bool>,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
}

pub struct AuthService {
    decoding_key: DecodingKey,
    dev_mode: bool,
}

impl AuthService {
    /// HS256 validation against the shared login-service secret.
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            dev_mode: false,
        }
    }

    /// Dev mode skips signature validation and accepts plain
    /// `id:username[:elo[:gamesPlayed]]` tokens for local play and tests.
    pub fn new_dev_mode() -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(b"dev"),
            dev_mode: true,
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        if self.dev_mode {
            return self.validate_dev_token(token);
        }

        let validation = Validation::new(Algorithm::HS256);
        let token_data =
            decode::<AccessTokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => {
                        tracing::warn!("JWT validation failed: {:?}", e);
                        AuthError::InvalidToken
                    }
                }
            })?;

        let claims = token_data.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            tracing::warn!("JWT subject is not a UUID: {}", claims.sub);
            AuthError::InvalidToken
        })?;

        let is_guest = claims.is_guest.unwrap_or(false);
        let username = claims
            .username
            .or(claims.display_name)
            .unwrap_or_else(|| format!("Player_{}", &claims.sub[..8.min(claims.sub.len())]));

        Ok(AuthUser {
            user_id: if is_guest { None } else { Some(user_id) },
            username,
            elo: if is_guest {
                AuthUser::GUEST_ELO
            } else {
                claims.elo.unwrap_or(1000)
            },
            games_played: claims.games_played.unwrap_or(0),
            is_guest,
            avatar_url: claims.avatar_url,
        })
    }

    fn validate_dev_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let parts: Vec<&str> = token.split(':').collect();
        if parts.len() < 2 {
            return Err(AuthError::InvalidToken);
        }

        let user_id = Uuid::parse_str(parts[0]).map_err(|_| AuthError::InvalidToken)?;
        let elo = parts
            .get(2)
            .and_then(|p| p.parse().ok())
            .unwrap_or(1000);
        let games_played = parts.get(3).and_then(|p| p.parse().ok()).unwrap_or(0);

        Ok(AuthUser {
            user_id: Some(user_id),
            username: parts[1].to_string(),
            elo,
            games_played,
            is_guest: false,
            avatar_url: None,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}
