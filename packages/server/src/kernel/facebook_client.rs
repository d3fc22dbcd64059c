//! Thin Facebook Graph API client for the Lead Ads integration.
//!
//! Covers exactly what the integration needs: the OAuth code exchange, the
//! page listing (pages carry their own access tokens), the leadgen webhook
//! subscription and the single-lead fetch. Everything else stays out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::BaseFacebookClient;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

/// Facebook Graph API client
pub struct FacebookClient {
    app_id: String,
    app_secret: String,
    client: reqwest::Client,
}

/// Token response from the OAuth code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookTokens {
    pub access_token: String,
    /// Seconds until expiry; absent for long-lived page tokens
    pub expires_in: Option<i64>,
}

/// A page the connected user manages
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct PageListResponse {
    data: Vec<FacebookPage>,
}

#[derive(Debug, Deserialize)]
struct SubscribeResponse {
    #[serde(default)]
    success: bool,
}

/// One field the prospect filled in on the lead form
#[derive(Debug, Clone, Deserialize)]
pub struct LeadField {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A submitted lead fetched by leadgen id
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookLead {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub field_data: Vec<LeadField>,
}

impl FacebookLead {
    /// First value of a named form field, if the prospect filled it in.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.field_data
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.values.first())
            .map(String::as_str)
    }
}

/// Build the Facebook login dialog URL for the OAuth flow.
pub fn oauth_dialog_url(app_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "https://www.facebook.com/v19.0/dialog/oauth?client_id={}&redirect_uri={}&state={}&scope={}",
        urlencoding::encode(app_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode("pages_show_list,pages_manage_metadata,leads_retrieval"),
    )
}

impl FacebookClient {
    /// Create a new Graph API client
    pub fn new(app_id: String, app_secret: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            app_id,
            app_secret,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send Graph API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Graph API error {}: {}", status, body);
        }

        response.json().await.context("Failed to parse Graph API response")
    }
}

#[async_trait]
impl BaseFacebookClient for FacebookClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<FacebookTokens> {
        let url = format!(
            "{}/oauth/access_token?client_id={}&redirect_uri={}&client_secret={}&code={}",
            GRAPH_BASE,
            urlencoding::encode(&self.app_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.app_secret),
            urlencoding::encode(code),
        );
        self.get_json(url).await
    }

    async fn fetch_pages(&self, user_token: &str) -> Result<Vec<FacebookPage>> {
        let url = format!(
            "{}/me/accounts?access_token={}",
            GRAPH_BASE,
            urlencoding::encode(user_token),
        );
        let response: PageListResponse = self.get_json(url).await?;
        Ok(response.data)
    }

    async fn subscribe_page(&self, page_id: &str, page_token: &str) -> Result<()> {
        let url = format!(
            "{}/{}/subscribed_apps?subscribed_fields=leadgen&access_token={}",
            GRAPH_BASE,
            page_id,
            urlencoding::encode(page_token),
        );

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to send page subscribe request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Graph API error {}: {}", status, body);
        }

        let body: SubscribeResponse = response
            .json()
            .await
            .context("Failed to parse subscribe response")?;
        if !body.success {
            anyhow::bail!("Page subscription was not accepted");
        }

        Ok(())
    }

    async fn fetch_lead(&self, leadgen_id: &str, page_token: &str) -> Result<FacebookLead> {
        let url = format!(
            "{}/{}?access_token={}",
            GRAPH_BASE,
            leadgen_id,
            urlencoding::encode(page_token),
        );
        self.get_json(url).await
    }
}

/// No-op client for testing or when the Facebook app is not configured
pub struct NoopFacebookClient;

#[async_trait]
impl BaseFacebookClient for NoopFacebookClient {
    async fn exchange_code(&self, _code: &str, _redirect_uri: &str) -> Result<FacebookTokens> {
        anyhow::bail!("Facebook app credentials not configured")
    }

    async fn fetch_pages(&self, _user_token: &str) -> Result<Vec<FacebookPage>> {
        anyhow::bail!("Facebook app credentials not configured")
    }

    async fn subscribe_page(&self, _page_id: &str, _page_token: &str) -> Result<()> {
        anyhow::bail!("Facebook app credentials not configured")
    }

    async fn fetch_lead(&self, _leadgen_id: &str, _page_token: &str) -> Result<FacebookLead> {
        anyhow::bail!("Facebook app credentials not configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_url_encodes_params() {
        let url = oauth_dialog_url("123", "https://crm.example.com/cb", "st@te");
        assert!(url.starts_with("https://www.facebook.com/v19.0/dialog/oauth?"));
        assert!(url.contains("client_id=123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fcrm.example.com%2Fcb"));
        assert!(url.contains("state=st%40te"));
        assert!(url.contains("leads_retrieval"));
    }

    #[test]
    fn test_lead_field_lookup() {
        let lead: FacebookLead = serde_json::from_value(serde_json::json!({
            "id": "444",
            "created_time": "2024-05-01T12:00:00+0000",
            "field_data": [
                {"name": "full_name", "values": ["Ada Lovelace"]},
                {"name": "email", "values": ["ada@example.com"]},
                {"name": "empty", "values": []}
            ]
        }))
        .unwrap();

        assert_eq!(lead.field("full_name"), Some("Ada Lovelace"));
        assert_eq!(lead.field("email"), Some("ada@example.com"));
        assert_eq!(lead.field("empty"), None);
        assert_eq!(lead.field("missing"), None);
    }

    #[test]
    fn test_lead_parses_without_field_data() {
        let lead: FacebookLead =
            serde_json::from_value(serde_json::json!({"id": "444"})).unwrap();
        assert!(lead.field_data.is_empty());
        assert!(lead.created_time.is_none());
    }
}
