use std::{fmt, time::Duration};

use clap::Args;

use crate::RewriteConfig;

/// HTTP basic auth credentials, either from the caller or from configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Shim settings. Every one can come from a flag or the environment, and `main` reads a
/// `.env` file from the working directory before parsing.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Hostname of the Splunk management API.
    #[arg(long, env = "SPLUNK_HOSTNAME")]
    pub splunk_hostname: String,

    #[arg(long, env = "SPLUNK_PORT", default_value_t = 8089)]
    pub splunk_port: u16,

    #[arg(long, env = "SPLUNK_SCHEME", default_value = "https")]
    pub splunk_scheme: String,

    /// Used when the caller doesn't send basic auth.
    #[arg(long, env = "SPLUNK_USERNAME")]
    pub splunk_username: Option<String>,

    #[arg(long, env = "SPLUNK_PASSWORD", hide_env_values = true)]
    pub splunk_password: Option<String>,

    /// Skip TLS certificate verification against the management API.
    #[arg(long, env = "SPLUNK_INSECURE")]
    pub splunk_insecure: bool,

    /// Rewrite the SLO and ACS locations in the returned metadata.
    #[arg(long, env = "REWRITE_LOCATION")]
    pub rewrite_location: bool,

    #[arg(long, env = "REWRITE_HOST")]
    pub rewrite_host: Option<String>,

    #[arg(long, env = "REWRITE_SCHEME")]
    pub rewrite_scheme: Option<String>,

    /// IdP metadata to pull the encryption certificate from.
    #[arg(long, env = "IDP_METADATA_URL")]
    pub idp_metadata_url: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Sub-path the shim is served under.
    #[arg(long, env = "ROOT_PATH", default_value = "/")]
    pub root_path: String,

    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,
}

impl AppConfig {
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.splunk_scheme, self.splunk_hostname, self.splunk_port
        )
    }

    pub fn rewrite_config(&self) -> RewriteConfig {
        RewriteConfig {
            enabled: self.rewrite_location,
            host: self.rewrite_host.clone(),
            scheme: self.rewrite_scheme.clone(),
        }
    }

    /// Configured credentials, only when both halves are present.
    pub fn fallback_credentials(&self) -> Option<Credentials> {
        match (&self.splunk_username, &self.splunk_password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
