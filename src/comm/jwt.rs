//! HS256 令牌编解码 / HS256 token encode and decode
//!
//! 服务端用 [`verify_hs256`] 校验签名；客户端只需 [`decode_payload`] 读取声明。
//! The server checks signatures with [`verify_hs256`]; clients only read claims with
//! [`decode_payload`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("token must have three segments")]
    Segments,
    #[error("token segment is not base64url")]
    Encoding,
    #[error("token payload is not valid json: {0}")]
    Payload(String),
    #[error("token signature mismatch")]
    Signature,
}

fn split(token: &str) -> Result<(&str, &str, &str), JwtError> {
    let mut parts = token.trim().splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if !h.is_empty() && !p.is_empty() && !s.contains('.') => {
            Ok((h, p, s))
        }
        _ => Err(JwtError::Segments),
    }
}

/// 不校验签名地读取声明 / Read the claims without checking the signature
pub fn decode_payload<T: DeserializeOwned>(token: &str) -> Result<T, JwtError> {
    let (_, payload, _) = split(token)?;
    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| JwtError::Encoding)?;
    serde_json::from_slice(&raw).map_err(|e| JwtError::Payload(e.to_string()))
}

/// 校验签名并返回声明 / Check the signature and return the claims
pub fn verify_hs256<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<T, JwtError> {
    let (header, payload, signature) = split(token)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature.trim_end_matches('='))
        .map_err(|_| JwtError::Encoding)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| JwtError::Signature)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| JwtError::Signature)?;
    decode_payload(token)
}

/// 签发令牌 / Sign a token
pub fn sign_hs256<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, JwtError> {
    let payload = serde_json::to_vec(claims).map_err(|e| JwtError::Payload(e.to_string()))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| JwtError::Signature)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", signing_input, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn signed_token_verifies_and_decodes() {
        let token = sign_hs256(&json!({"id": "abc", "exp": 10}), b"secret").unwrap();
        let claims: Value = verify_hs256(&token, b"secret").unwrap();
        assert_eq!(claims["id"], "abc");
        let unchecked: Value = decode_payload(&token).unwrap();
        assert_eq!(unchecked, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_hs256(&json!({"id": "abc"}), b"secret").unwrap();
        assert_eq!(
            verify_hs256::<Value>(&token, b"other").unwrap_err(),
            JwtError::Signature
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(decode_payload::<Value>("nope").unwrap_err(), JwtError::Segments);
        assert_eq!(
            decode_payload::<Value>("a.!!!.c").unwrap_err(),
            JwtError::Encoding
        );
    }
}
