use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};

use crate::domains::integrations::commands::ImportFacebookLeadCommand;
use crate::kernel::ServerDeps;

/// Outcome of a leadgen webhook delivery
#[derive(Debug)]
pub enum LeadgenWebhookResult {
    /// Signature checked out; this many new import jobs were enqueued
    Accepted { enqueued: usize },
    /// Signature missing or wrong; the body was not touched
    InvalidSignature,
}

#[derive(Debug, Deserialize)]
struct LeadgenPayload {
    #[serde(default)]
    entry: Vec<LeadgenEntry>,
}

#[derive(Debug, Deserialize)]
struct LeadgenEntry {
    #[serde(default)]
    changes: Vec<LeadgenChange>,
}

#[derive(Debug, Deserialize)]
struct LeadgenChange {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: Value,
}

/// Webhook verification handshake (`GET /webhooks/facebook`).
/// Returns the challenge to echo back, or `None` for a 403.
pub fn verify_subscription(
    mode: &str,
    verify_token: &str,
    challenge: String,
    deps: &ServerDeps,
) -> Option<String> {
    if mode == "subscribe"
        && !deps.facebook_webhook_verify_token.is_empty()
        && verify_token == deps.facebook_webhook_verify_token
    {
        Some(challenge)
    } else {
        None
    }
}

/// Leadgen delivery (`POST /webhooks/facebook`).
///
/// The signature covers the raw body bytes, so verification happens before
/// any parsing. Import work is queued, never done inline: Facebook expects
/// a fast 200 and redelivers on timeout.
pub async fn receive_leadgen(
    body: &[u8],
    signature: Option<&str>,
    deps: &ServerDeps,
) -> Result<LeadgenWebhookResult> {
    if !signature_matches(body, signature, &deps.facebook_app_secret) {
        warn!("leadgen webhook rejected: signature mismatch");
        return Ok(LeadgenWebhookResult::InvalidSignature);
    }

    let payload: LeadgenPayload =
        serde_json::from_slice(body).context("malformed leadgen payload")?;

    let mut enqueued = 0;
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "leadgen" {
                continue;
            }
            let Some(leadgen_id) = change.value.get("leadgen_id").and_then(id_string) else {
                warn!("leadgen change without a leadgen_id, skipping");
                continue;
            };

            let result = deps
                .job_queue
                .enqueue(ImportFacebookLeadCommand {
                    leadgen_id,
                    form_id: change.value.get("form_id").and_then(id_string),
                    page_id: change.value.get("page_id").and_then(id_string),
                })
                .await?;

            if result.is_created() {
                enqueued += 1;
            }
        }
    }

    info!(enqueued, "leadgen webhook accepted");
    Ok(LeadgenWebhookResult::Accepted { enqueued })
}

/// Constant-time check of the `X-Hub-Signature-256` header against the body
fn signature_matches(body: &[u8], header: Option<&str>, app_secret: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    let Some(hex_signature) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(claimed) = hex::decode(hex_signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&claimed).is_ok()
}

/// Facebook sends ids as strings or bare numbers depending on the surface
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_signature_matches_only_the_right_secret() {
        let body = br#"{"entry":[]}"#;
        let header = sign(body, "app-secret");

        assert!(signature_matches(body, Some(&header), "app-secret"));
        assert!(!signature_matches(body, Some(&header), "other-secret"));
        assert!(!signature_matches(b"tampered", Some(&header), "app-secret"));
        assert!(!signature_matches(body, None, "app-secret"));
        assert!(!signature_matches(body, Some("sha256=zz"), "app-secret"));
        assert!(!signature_matches(body, Some("md5=abc"), "app-secret"));
    }

    #[test]
    fn test_id_string_accepts_strings_and_numbers() {
        assert_eq!(id_string(&serde_json::json!("123")), Some("123".to_string()));
        assert_eq!(id_string(&serde_json::json!(123)), Some("123".to_string()));
        assert_eq!(id_string(&serde_json::json!(null)), None);
        assert_eq!(id_string(&serde_json::json!({})), None);
    }

    #[test]
    fn test_payload_parses_leadgen_changes() {
        let body = serde_json::json!({
            "object": "page",
            "entry": [{
                "id": "999",
                "time": 1_700_000_000,
                "changes": [{
                    "field": "leadgen",
                    "value": { "leadgen_id": 444, "form_id": "88", "page_id": "999" }
                }]
            }]
        });

        let parsed: LeadgenPayload = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.entry.len(), 1);
        let change = &parsed.entry[0].changes[0];
        assert_eq!(change.field, "leadgen");
        assert_eq!(
            change.value.get("leadgen_id").and_then(id_string),
            Some("444".to_string())
        );
    }
}
