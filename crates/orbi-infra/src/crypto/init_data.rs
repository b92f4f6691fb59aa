//! Telegram mini-app init data verification.
//!
//! The web front-end sends the raw `initData` query string it received from
//! the Telegram client. It is authentic when its `hash` field equals
//! `HMAC_SHA256(secret, data_check_string)` where
//! `secret = HMAC_SHA256(key = "WebAppData", msg = bot_token)` and the
//! data-check string is every other `key=value` pair, URL-decoded, sorted
//! and joined with `\n`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SECRET_KEY_SALT: &[u8] = b"WebAppData";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("init data has no hash field")]
    MissingHash,

    #[error("init data signature mismatch")]
    InvalidSignature,

    #[error("init data has no user field")]
    MissingUser,

    #[error("invalid user field: {0}")]
    InvalidUser(String),

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// The `user` object embedded in init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Verifies init data signed for one bot token.
#[derive(Clone)]
pub struct InitDataVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDataVerifier").finish_non_exhaustive()
    }
}

impl InitDataVerifier {
    pub fn new(bot_token: &SecretString) -> Result<Self, InitDataError> {
        let mut mac = HmacSha256::new_from_slice(SECRET_KEY_SALT)
            .map_err(|e| InitDataError::InvalidKey(e.to_string()))?;
        mac.update(bot_token.expose_secret().as_bytes());
        Ok(Self {
            secret: mac.finalize().into_bytes().to_vec(),
        })
    }

    /// Check the signature and return the user it vouches for.
    pub fn verify(&self, init_data: &str) -> Result<WebAppUser, InitDataError> {
        let mut hash = None;
        let mut fields = Vec::new();
        for (key, value) in url::form_urlencoded::parse(init_data.as_bytes()) {
            if key == "hash" {
                hash = Some(value.into_owned());
            } else {
                fields.push((key.into_owned(), value.into_owned()));
            }
        }
        let hash = hash.ok_or(InitDataError::MissingHash)?;
        let expected = hex_decode(&hash).map_err(|_| InitDataError::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(data_check_string(&fields).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| InitDataError::InvalidSignature)?;

        let user = fields
            .iter()
            .find(|(k, _)| k == "user")
            .map(|(_, v)| v)
            .ok_or(InitDataError::MissingUser)?;
        let user: WebAppUser =
            serde_json::from_str(user).map_err(|e| InitDataError::InvalidUser(e.to_string()))?;
        if user.id <= 0 {
            return Err(InitDataError::InvalidUser(format!("user id {} is not positive", user.id)));
        }
        Ok(user)
    }

    /// Produce a signed init data query string for `fields`.
    ///
    /// The inverse of [`verify`](Self::verify); used by local tooling and tests.
    pub fn sign(&self, fields: &[(&str, &str)]) -> Result<String, InitDataError> {
        let owned: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut mac = self.mac()?;
        mac.update(data_check_string(&owned).as_bytes());
        let hash = hex_encode(&mac.finalize().into_bytes());

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in fields {
            query.append_pair(k, v);
        }
        query.append_pair("hash", &hash);
        Ok(query.finish())
    }

    fn mac(&self) -> Result<HmacSha256, InitDataError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| InitDataError::InvalidKey(e.to_string()))
    }
}

fn data_check_string(fields: &[(String, String)]) -> String {
    let mut pairs: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join("\n")
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
