//! HMAC-signed JWT issuing and verification.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};

use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthResult};

/// Algorithms accepted on verification. Tokens are always issued as HS256.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Issuer/verifier pair bound to one shared secret.
#[derive(Clone)]
pub struct HmacTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl HmacTokens {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.required_spec_claims = HashSet::from(["sub".to_string()]);
        validation.validate_aud = false;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Require `iss` on verification.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require `aud` on verification.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    pub fn issue(&self, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::TokenSign(e.to_string()))
    }

    /// Verify signature, algorithm family and time claims, returning the payload.
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        let header = decode_header(token).map_err(|e| AuthError::TokenParse(e.to_string()))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::InvalidJwtSign);
        }

        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::TokenParse(e.to_string()))
    }
}

impl core::fmt::Debug for HmacTokens {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HmacTokens")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}
