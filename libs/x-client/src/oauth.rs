//! OAuth 1.0a request signing (HMAC-SHA1) for user-context X API calls.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha1::Sha1;
use url::{Position, Url};

use crate::PostingError;

type HmacSha1 = Hmac<Sha1>;

const NONCE_LEN: usize = 32;

/// The four user-context secrets issued for an X app.
#[derive(Clone, PartialEq, Eq)]
pub struct XCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl fmt::Debug for XCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// `Authorization` header value for a request, with a fresh nonce and timestamp.
pub fn authorization_header(
    credentials: &XCredentials,
    method: &str,
    url: &Url,
) -> Result<String, PostingError> {
    let nonce: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect();
    let timestamp = chrono::Utc::now().timestamp();
    sign(credentials, method, url, &[], &nonce, timestamp)
}

/// Deterministic signing. `form_params` are urlencoded body parameters, which
/// take part in the signature; JSON bodies do not.
pub fn sign(
    credentials: &XCredentials,
    method: &str,
    url: &Url,
    form_params: &[(&str, &str)],
    nonce: &str,
    timestamp: i64,
) -> Result<String, PostingError> {
    let timestamp = timestamp.to_string();
    let oauth_params: [(&str, &str); 6] = [
        ("oauth_consumer_key", credentials.api_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(
            oauth_params
                .iter()
                .chain(form_params)
                .map(|(k, v)| (encode(k), encode(v))),
        )
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&url[..Position::AfterPath]),
        encode(&parameter_string)
    );
    let signing_key = format!(
        "{}&{}",
        encode(&credentials.api_secret),
        encode(&credentials.access_secret)
    );

    let signature = hmac_sha1_base64(&signing_key, &base_string)?;

    let mut header_params: Vec<(&str, &str)> = oauth_params.to_vec();
    header_params.push(("oauth_signature", signature.as_str()));
    header_params.sort();

    let fields = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

fn hmac_sha1_base64(key: &str, message: &str) -> Result<String, PostingError> {
    let Ok(mut mac) = HmacSha1::new_from_slice(key.as_bytes()) else {
        return Err(PostingError::Signing("invalid HMAC key".to_string()));
    };
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~`.
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
