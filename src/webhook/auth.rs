use std::net::IpAddr;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::WebhookConfig;
use crate::shared::error::MailroomError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Storage-Signature";

/// Validates inbound provider events before any side effect runs. Checks
/// short-circuit in order: source IP, basic credential, body signature.
/// Fails closed; an empty allowlist or a missing signature is only accepted
/// under the explicit configuration relaxations.
pub struct WebhookAuthenticator<'a> {
    config: &'a WebhookConfig,
}

impl<'a> WebhookAuthenticator<'a> {
    pub fn new(config: &'a WebhookConfig) -> Self {
        Self { config }
    }

    pub fn authorize(
        &self,
        peer: IpAddr,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> Result<(), MailroomError> {
        self.check_source_ip(peer)?;
        self.check_basic_credential(headers)?;
        self.check_signature(headers, raw_body)
    }

    fn check_source_ip(&self, peer: IpAddr) -> Result<(), MailroomError> {
        if self.config.allowed_ips.is_empty() {
            return Ok(());
        }
        if self.config.allowed_ips.contains(&peer) {
            Ok(())
        } else {
            warn!(%peer, "webhook rejected: source address not in allowlist");
            Err(MailroomError::Unauthorized("source address not allowed"))
        }
    }

    fn check_basic_credential(&self, headers: &HeaderMap) -> Result<(), MailroomError> {
        let (Some(user), Some(password)) = (&self.config.basic_user, &self.config.basic_password)
        else {
            return Ok(());
        };
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(MailroomError::Unauthorized("missing credential"))?;
        let encoded = header
            .strip_prefix("Basic ")
            .ok_or(MailroomError::Unauthorized("missing credential"))?;
        let decoded = BASE64
            .decode(encoded)
            .map_err(|_| MailroomError::Unauthorized("bad credential"))?;
        let expected = format!("{user}:{password}");
        if constant_time_eq(&decoded, expected.as_bytes()) {
            Ok(())
        } else {
            Err(MailroomError::Unauthorized("bad credential"))
        }
    }

    fn check_signature(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), MailroomError> {
        let Some(value) = headers.get(SIGNATURE_HEADER) else {
            if self.config.allow_unsigned {
                warn!("accepting webhook event without signature header (unsigned opt-in is enabled)");
                return Ok(());
            }
            return Err(MailroomError::Unauthorized("missing signature"));
        };
        let supplied = value
            .to_str()
            .map_err(|_| MailroomError::Unauthorized("bad signature"))?;
        let expected = sign(&self.config.signing_secret, raw_body);
        if constant_time_eq(supplied.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            warn!("webhook rejected: signature mismatch");
            Err(MailroomError::Unauthorized("bad signature"))
        }
    }
}

/// Hex HMAC-SHA256 over the exact raw body. Also used by tests and by any
/// in-house sender that needs to produce a valid header.
pub fn sign(secret: &str, raw_body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_config() -> WebhookConfig {
        WebhookConfig {
            signing_secret: "test_secret".to_string(),
            basic_user: Some("provider".to_string()),
            basic_password: Some("hunter2".to_string()),
            allowed_ips: vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))],
            allow_unsigned: false,
            timeout_seconds: 10,
        }
    }

    fn signed_headers(config: &WebhookConfig, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let cred = BASE64.encode(format!(
            "{}:{}",
            config.basic_user.as_deref().unwrap_or_default(),
            config.basic_password.as_deref().unwrap_or_default()
        ));
        headers.insert(AUTHORIZATION, format!("Basic {cred}").parse().unwrap());
        headers.insert(
            SIGNATURE_HEADER,
            sign(&config.signing_secret, body).parse().unwrap(),
        );
        headers
    }

    fn allowed_peer() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
    }

    #[test]
    fn test_valid_event_is_authorized() {
        let config = test_config();
        let auth = WebhookAuthenticator::new(&config);
        let body = br#"{"event_type":"created"}"#;
        let headers = signed_headers(&config, body);
        assert!(auth.authorize(allowed_peer(), &headers, body).is_ok());
    }

    #[test]
    fn test_blocked_source_ip() {
        let config = test_config();
        let auth = WebhookAuthenticator::new(&config);
        let body = b"{}";
        let headers = signed_headers(&config, body);
        let peer = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9));
        let err = auth.authorize(peer, &headers, body).unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn test_empty_allowlist_accepts_any_source() {
        let mut config = test_config();
        config.allowed_ips.clear();
        let auth = WebhookAuthenticator::new(&config);
        let body = b"{}";
        let headers = signed_headers(&config, body);
        let peer = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9));
        assert!(auth.authorize(peer, &headers, body).is_ok());
    }

    #[test]
    fn test_bad_basic_credential() {
        let config = test_config();
        let auth = WebhookAuthenticator::new(&config);
        let body = b"{}";
        let mut headers = signed_headers(&config, body);
        let cred = BASE64.encode("provider:wrong");
        headers.insert(AUTHORIZATION, format!("Basic {cred}").parse().unwrap());
        assert!(auth.authorize(allowed_peer(), &headers, body).is_err());
    }

    #[test]
    fn test_tampered_body_fails_signature() {
        let config = test_config();
        let auth = WebhookAuthenticator::new(&config);
        let headers = signed_headers(&config, b"original");
        let err = auth
            .authorize(allowed_peer(), &headers, b"tampered")
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn test_missing_signature_rejected_by_default() {
        let config = test_config();
        let auth = WebhookAuthenticator::new(&config);
        let body = b"{}";
        let mut headers = signed_headers(&config, body);
        headers.remove(SIGNATURE_HEADER);
        assert!(auth.authorize(allowed_peer(), &headers, body).is_err());
    }

    #[test]
    fn test_missing_signature_accepted_with_opt_in() {
        let mut config = test_config();
        config.allow_unsigned = true;
        let auth = WebhookAuthenticator::new(&config);
        let body = b"{}";
        let mut headers = signed_headers(&config, body);
        headers.remove(SIGNATURE_HEADER);
        assert!(auth.authorize(allowed_peer(), &headers, body).is_ok());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
        assert!(!constant_time_eq(b"abc123", b"abc124"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
