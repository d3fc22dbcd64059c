//! Single-use OAuth state tokens, kept in the in-process cache.

use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

use crate::kernel::ServerDeps;

const STATE_TTL: Duration = Duration::from_secs(600);
const STATE_TAG: &str = "oauth-state";

fn state_key(state: &str) -> String {
    format!("oauth-state:{}", state)
}

/// Mint a state token for an OAuth redirect. Valid for ten minutes.
pub async fn issue_state(provider: &str, deps: &ServerDeps) -> String {
    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    deps.cache
        .put(
            &state_key(&state),
            json!({ "provider": provider }),
            STATE_TTL,
            &[STATE_TAG],
        )
        .await;

    state
}

/// Consume a state token. True only for a live token minted for `provider`;
/// the token is gone afterwards either way.
pub async fn consume_state(state: &str, provider: &str, deps: &ServerDeps) -> bool {
    let key = state_key(state);
    let Some(value) = deps.cache.get(&key).await else {
        return false;
    };
    deps.cache.invalidate(&key).await;

    value.get("provider").and_then(|v| v.as_str()) == Some(provider)
}
