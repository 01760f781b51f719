use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::providers::jira::JiraClient;
use crate::providers::monday::{MondayClient, DEFAULT_STATUS_COLUMN, MONDAY_API};
use crate::providers::Credential;
use crate::sync::allow_list::AllowList;
use crate::sync::log::ActivityLog;
use crate::sync::policy::{
    FixedInterval, UnauthorizedPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_STATUS_INTERVAL,
};
use crate::sync::{SyncContext, DEFAULT_STATUS_LABEL};

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub jira: Option<JiraConfig>,
    pub monday: Option<MondayConfig>,
    #[serde(default)]
    pub allow_list: AllowList,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct JiraConfig {
    /// Site host, e.g. `mycompany` or `mycompany.atlassian.net`. Used with `email` + `api_token`.
    pub domain: Option<String>,
    /// Cloud id for the OAuth gateway. Used with `access_token`.
    pub cloud_id: Option<String>,
    /// Explicit API base, overriding `domain` and `cloud_id`.
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MondayConfig {
    pub api_token: Option<String>,
    pub board_id: Option<String>,
    pub link_column: Option<String>,
    pub status_column: Option<String>,
    pub api_url: Option<String>,
    /// Further boards searched when marking an item by name.
    #[serde(default)]
    pub search_board_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub interval_secs: u64,
    pub status_interval_secs: u64,
    pub status_label: String,
    pub stop_on_unauthorized: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            status_interval_secs: DEFAULT_STATUS_INTERVAL.as_secs(),
            status_label: DEFAULT_STATUS_LABEL.to_string(),
            stop_on_unauthorized: false,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn unauthorized_policy(&self) -> UnauthorizedPolicy {
        if self.stop_on_unauthorized {
            UnauthorizedPolicy::Fail
        } else {
            UnauthorizedPolicy::Retry
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

fn missing(what: &str) -> SyncError {
    SyncError::Configuration(format!("{what} is not configured"))
}

impl AppConfig {
    pub fn jira_client(&self) -> Result<JiraClient, SyncError> {
        let jira = self.jira.as_ref().ok_or_else(|| missing("[jira]"))?;

        if let Some(token) = &jira.access_token {
            if let Some(base) = &jira.base_url {
                return Ok(JiraClient::new(base, Credential::Bearer(token.clone())));
            }
            let cloud_id = jira.cloud_id.as_deref().ok_or_else(|| missing("jira.cloud_id"))?;
            return Ok(JiraClient::for_cloud(cloud_id, token.clone()));
        }

        let api_token = jira
            .api_token
            .clone()
            .ok_or_else(|| missing("jira.api_token or jira.access_token"))?;
        let email = jira.email.clone().ok_or_else(|| missing("jira.email"))?;
        match (&jira.base_url, &jira.domain) {
            (Some(base), _) => Ok(JiraClient::new(
                base,
                Credential::Basic { email, api_token },
            )),
            (None, Some(domain)) => Ok(JiraClient::for_site(domain, email, api_token)),
            (None, None) => Err(missing("jira.domain")),
        }
    }

    pub fn monday_client(&self) -> Result<MondayClient, SyncError> {
        let monday = self.monday.as_ref().ok_or_else(|| missing("[monday]"))?;
        let token = monday
            .api_token
            .clone()
            .ok_or_else(|| missing("monday.api_token"))?;
        let link_column = monday
            .link_column
            .clone()
            .ok_or_else(|| missing("monday.link_column"))?;
        Ok(MondayClient::new(token, link_column)
            .with_api_url(monday.api_url.as_deref().unwrap_or(MONDAY_API))
            .with_status_column(
                monday
                    .status_column
                    .as_deref()
                    .unwrap_or(DEFAULT_STATUS_COLUMN),
            ))
    }

    pub fn board_id(&self) -> Result<String, SyncError> {
        self.monday
            .as_ref()
            .and_then(|m| m.board_id.clone())
            .ok_or_else(|| missing("monday.board_id"))
    }

    /// The configured board followed by any extra search boards, without duplicates.
    pub fn search_boards(&self) -> Result<Vec<String>, SyncError> {
        let mut boards = vec![self.board_id()?];
        if let Some(monday) = &self.monday {
            for id in &monday.search_board_ids {
                if !boards.contains(id) {
                    boards.push(id.clone());
                }
            }
        }
        Ok(boards)
    }

    /// Builds the shared watcher context from configured clients.
    pub fn sync_context(&self) -> Result<SyncContext, SyncError> {
        let issues = Arc::new(self.jira_client()?);
        let board = Arc::new(self.monday_client()?);
        debug!(jira = issues.base_url(), "Configured tracker clients");
        if self.allow_list.is_empty() {
            warn!("Allow-list is empty; no board item will be updated");
        }
        Ok(SyncContext::new(issues, board, self.allow_list.clone())
            .with_policy(Arc::new(FixedInterval::new(self.watch.interval())))
            .with_activity(ActivityLog::default_location())
            .with_status_label(self.watch.status_label.clone())
            .with_unauthorized_policy(self.watch.unauthorized_policy()))
    }

    /// Secrets and ids from the environment take precedence over the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `lookup`. Empty values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let env = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let jira_vars = [
            env("JIRA_DOMAIN"),
            env("JIRA_CLOUD_ID"),
            env("JIRA_EMAIL"),
            env("JIRA_API_TOKEN"),
            env("JIRA_ACCESS_TOKEN"),
        ];
        if jira_vars.iter().any(Option::is_some) {
            let [domain, cloud_id, email, api_token, access_token] = jira_vars;
            let jira = self.jira.get_or_insert_with(JiraConfig::default);
            jira.domain = domain.or(jira.domain.take());
            jira.cloud_id = cloud_id.or(jira.cloud_id.take());
            jira.email = email.or(jira.email.take());
            jira.api_token = api_token.or(jira.api_token.take());
            jira.access_token = access_token.or(jira.access_token.take());
        }

        let monday_vars = [env("MONDAY_API_TOKEN"), env("MONDAY_BOARD_ID")];
        if monday_vars.iter().any(Option::is_some) {
            let [api_token, board_id] = monday_vars;
            let monday = self.monday.get_or_insert_with(MondayConfig::default);
            monday.api_token = api_token.or(monday.api_token.take());
            monday.board_id = board_id.or(monday.board_id.take());
        }
    }
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".donesync")
}

fn config_path() -> PathBuf {
    std::env::var_os("DONESYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("config.toml"))
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Loads `.env`, the config file, then environment overrides.
pub fn load_config() -> Result<AppConfig> {
    let _ = dotenvy::dotenv();
    let mut config = load_config_from(&config_path())?;
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(toml_text: &str) -> AppConfig {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.jira.is_none());
        assert_eq!(config.watch.interval_secs, 60);
        assert_eq!(config.watch.status_interval_secs, 15);
        assert_eq!(config.watch.status_label, "UP TO DATE");
        assert_eq!(config.server.bind, "127.0.0.1:5000");
    }

    #[test]
    fn parses_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[jira]
domain = "themxgroup-team"
email = "me@example.com"
api_token = "jira-token"

[monday]
api_token = "monday-token"
board_id = "9244201387"
link_column = "text_link"

[allow_list]
issues = ["KT-1"]
items = ["Test Project 1"]

[watch]
interval_secs = 30
stop_on_unauthorized = true
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert!(config.allow_list.is_eligible("KT-1", "Test Project 1"));
        assert_eq!(config.watch.interval(), Duration::from_secs(30));
        assert_eq!(config.watch.status_interval_secs, 15);
        assert_eq!(config.watch.unauthorized_policy(), UnauthorizedPolicy::Fail);
        assert_eq!(config.board_id().unwrap(), "9244201387");
        assert_eq!(
            config.jira_client().unwrap().base_url(),
            "https://themxgroup-team.atlassian.net"
        );
        assert!(config.monday_client().is_ok());
    }

    #[test]
    fn oauth_jira_uses_cloud_gateway() {
        let config = parse(
            r#"
[jira]
cloud_id = "abc"
access_token = "tok"
"#,
        );
        assert_eq!(
            config.jira_client().unwrap().base_url(),
            "https://api.atlassian.com/ex/jira/abc"
        );
    }

    #[test]
    fn missing_credentials_are_configuration_errors() {
        let config = AppConfig::default();
        assert!(matches!(config.jira_client(), Err(SyncError::Configuration(_))));
        assert!(matches!(config.monday_client(), Err(SyncError::Configuration(_))));
        assert!(matches!(config.board_id(), Err(SyncError::Configuration(_))));

        let config = parse("[monday]\napi_token = \"t\"\n");
        let err = config.monday_client().err().unwrap();
        assert!(err.to_string().contains("link_column"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = parse(
            r#"
[jira]
domain = "file-site"
email = "file@example.com"
api_token = "file-token"

[monday]
api_token = "file-monday"
board_id = "1"
link_column = "text_link"
"#,
        );
        let vars: HashMap<&str, &str> = [
            ("JIRA_DOMAIN", "env-site"),
            ("JIRA_API_TOKEN", "env-token"),
            ("JIRA_EMAIL", ""),
            ("MONDAY_BOARD_ID", "9244201387"),
            ("MONDAY_API_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        let jira = config.jira.as_ref().unwrap();
        assert_eq!(jira.domain.as_deref(), Some("env-site"));
        assert_eq!(jira.api_token.as_deref(), Some("env-token"));
        assert_eq!(jira.email.as_deref(), Some("file@example.com"));
        let monday = config.monday.as_ref().unwrap();
        assert_eq!(monday.board_id.as_deref(), Some("9244201387"));
        assert_eq!(monday.api_token.as_deref(), Some("file-monday"));
        assert_eq!(
            config.jira_client().unwrap().base_url(),
            "https://env-site.atlassian.net"
        );
    }

    #[test]
    fn environment_creates_missing_sections() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| match name {
            "JIRA_CLOUD_ID" => Some("abc".into()),
            "JIRA_ACCESS_TOKEN" => Some("tok".into()),
            "MONDAY_API_TOKEN" => Some("m".into()),
            _ => None,
        });
        assert_eq!(
            config.jira_client().unwrap().base_url(),
            "https://api.atlassian.com/ex/jira/abc"
        );
        assert_eq!(config.monday.unwrap().api_token.as_deref(), Some("m"));
    }

    #[test]
    fn empty_environment_leaves_config_untouched() {
        let mut config = AppConfig::default();
        config.apply_overrides(|_| Some(String::new()));
        assert!(config.jira.is_none());
        assert!(config.monday.is_none());
    }

    #[test]
    fn search_boards_start_with_configured_board() {
        let config = parse(
            r#"
[monday]
board_id = "9244201387"
search_board_ids = ["9244201551", "9244201387"]
"#,
        );
        assert_eq!(
            config.search_boards().unwrap(),
            vec!["9244201387", "9244201551"]
        );
        assert!(AppConfig::default().search_boards().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watch\ninterval_secs = ").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}
