//! WebSocket session token verification.
//!
//! Session issuance lives with the main application's auth stack;
//! this side only checks that a presented token is a valid, unexpired
//! HS256 JWT signed with the shared secret.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use threadpulse_core::broadcast::SessionVerifier;

#[derive(Debug, Deserialize)]
struct Claims {
    #[allow(dead_code)]
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

pub struct JwtSessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

impl SessionVerifier for JwtSessionVerifier {
    fn verify(&self, token: &str) -> bool {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("Rejected websocket token: {}", err);
                false
            }
        }
    }
}
