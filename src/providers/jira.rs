use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Credential, IssueSource};
use crate::error::{SyncError, SyncResult};
use crate::model::issue::IssueSnapshot;

const ATLASSIAN_API: &str = "https://api.atlassian.com";

pub struct JiraClient {
    base_url: String,
    credential: Credential,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            client: reqwest::Client::new(),
        }
    }

    /// Client for the OAuth gateway, addressed by cloud id.
    pub fn for_cloud(cloud_id: &str, access_token: String) -> Self {
        Self::new(
            format!("{ATLASSIAN_API}/ex/jira/{cloud_id}"),
            Credential::Bearer(access_token),
        )
    }

    /// Client for a site such as `mycompany.atlassian.net`, using an API token.
    pub fn for_site(domain: &str, email: String, api_token: String) -> Self {
        let host = if domain.contains('.') {
            domain.to_string()
        } else {
            format!("{domain}.atlassian.net")
        };
        Self::new(
            format!("https://{host}"),
            Credential::Basic { email, api_token },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn issue_url(&self, key: &str) -> String {
        format!(
            "{}/rest/api/3/issue/{}?fields=status,subtasks",
            self.base_url,
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn fetch_issue(&self, key: &str) -> SyncResult<IssueSnapshot> {
        let url = self.issue_url(key);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.credential.header_value())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED {
            warn!(
                url = %url,
                scheme = self.credential.scheme(),
                body = %body,
                "Jira rejected the credential; re-authentication required"
            );
            return Err(SyncError::Unauthorized { url, body });
        }
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), body = %body, "Jira issue request failed");
            return Err(SyncError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body).unwrap_or_else(|e| {
            debug!(issue = key, error = %e, "Jira body is not JSON; treating status as unknown");
            Value::Null
        });
        Ok(IssueSnapshot::from_json(key, &json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_domain_expands_to_atlassian_host() {
        let client = JiraClient::for_site("themxgroup-team", "a@b.c".into(), "t".into());
        assert_eq!(client.base_url(), "https://themxgroup-team.atlassian.net");

        let client = JiraClient::for_site("jira.example.com", "a@b.c".into(), "t".into());
        assert_eq!(client.base_url(), "https://jira.example.com");
    }

    #[test]
    fn cloud_client_uses_gateway() {
        let client = JiraClient::for_cloud("abc-123", "token".into());
        assert_eq!(client.base_url(), "https://api.atlassian.com/ex/jira/abc-123");
    }

    #[test]
    fn issue_url_requests_status_and_subtasks() {
        let client = JiraClient::new("http://localhost:1/", Credential::Bearer("t".into()));
        assert_eq!(
            client.issue_url("KT-1"),
            "http://localhost:1/rest/api/3/issue/KT-1?fields=status,subtasks"
        );
    }
}
