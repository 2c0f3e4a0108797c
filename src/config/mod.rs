use crate::utils::error::{IssueError, Result};
use clap::Parser;
use std::time::Duration;
use url::Url;

/// Timing and mode knobs for the browser protocols. Short per-candidate
/// timeouts keep fallback chains cheap; the longer stage budgets bound the
/// polling loops that wait for asynchronous page transitions.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    pub per_locator_timeout: Duration,
    pub stage_timeout: Duration,
    pub poll_interval: Duration,
    /// How long to wait for a human to finish logging in (OTP screens etc.)
    /// when no credentials are configured.
    pub manual_login_timeout: Duration,
    pub download_timeout: Duration,
    /// Stop at the confirmation screen instead of paying. Supervised runs.
    pub dry_run: bool,
    /// Allow the login stage to wait for a human instead of filling credentials.
    pub manual_login: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            per_locator_timeout: Duration::from_secs(2),
            stage_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            manual_login_timeout: Duration::from_secs(300),
            download_timeout: Duration::from_secs(60),
            dry_run: false,
            manual_login: false,
        }
    }
}

/// Portal login credentials for one carrier. Both fields empty means the
/// operator logs in by hand (manual-login mode).
#[derive(Debug, Clone, Default)]
pub struct CarrierCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CarrierCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn provided(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) => Some((u, p)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "atena-auto")]
#[command(about = "Issue a shipping label for a pending order via the carrier web portal")]
pub struct CliConfig {
    /// Order to issue a label for.
    #[arg(long)]
    pub order_id: String,

    /// click_post | yamato_compact
    #[arg(long)]
    pub shipping_method: String,

    #[arg(long, default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    #[arg(long, default_value = "./downloads")]
    pub download_dir: String,

    /// JSON file of orders to seed the in-memory store from.
    #[arg(long, default_value = "./orders.json")]
    pub orders_file: String,

    #[arg(long, env = "CLICKPOST_EMAIL")]
    pub clickpost_email: Option<String>,

    #[arg(long, env = "CLICKPOST_PASSWORD", hide_env_values = true)]
    pub clickpost_password: Option<String>,

    #[arg(long, env = "YAMATO_ID")]
    pub yamato_id: Option<String>,

    #[arg(long, env = "YAMATO_PASSWORD", hide_env_values = true)]
    pub yamato_password: Option<String>,

    /// Stop at the confirmation screen without paying.
    #[arg(long)]
    pub dry_run: bool,

    /// Open the portal and wait for a human to log in (runs headful).
    #[arg(long)]
    pub manual_login: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn validate(&self) -> Result<()> {
        if self.order_id.trim().is_empty() {
            return Err(IssueError::Config {
                field: "order_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        match Url::parse(&self.webdriver_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(IssueError::Config {
                    field: "webdriver_url".to_string(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                })
            }
            Err(e) => {
                return Err(IssueError::Config {
                    field: "webdriver_url".to_string(),
                    reason: format!("invalid URL: {}", e),
                })
            }
        }

        Ok(())
    }

    pub fn automation(&self) -> AutomationConfig {
        AutomationConfig {
            dry_run: self.dry_run,
            manual_login: self.manual_login,
            ..AutomationConfig::default()
        }
    }

    pub fn clickpost_credentials(&self) -> CarrierCredentials {
        CarrierCredentials {
            username: self.clickpost_email.clone(),
            password: self.clickpost_password.clone(),
        }
    }

    pub fn yamato_credentials(&self) -> CarrierCredentials {
        CarrierCredentials {
            username: self.yamato_id.clone(),
            password: self.yamato_password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CliConfig {
        CliConfig {
            order_id: "ORD-001".to_string(),
            shipping_method: "click_post".to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            download_dir: "./downloads".to_string(),
            orders_file: "./orders.json".to_string(),
            clickpost_email: None,
            clickpost_password: None,
            yamato_id: None,
            yamato_password: None,
            dry_run: false,
            manual_login: false,
            verbose: false,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_webdriver_url() {
        let mut config = base_config();
        config.webdriver_url = "ftp://host".to_string();
        assert!(config.validate().is_err());

        config.webdriver_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_order_id() {
        let mut config = base_config();
        config.order_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_provided_requires_both_fields() {
        let creds = CarrierCredentials {
            username: Some("user@example.com".to_string()),
            password: None,
        };
        assert!(creds.provided().is_none());

        let creds = CarrierCredentials::new("user@example.com", "secret");
        assert_eq!(creds.provided(), Some(("user@example.com", "secret")));
    }
}
