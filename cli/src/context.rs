//! Per-invocation state shared by the command handlers.

use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use doppler_core::HttpClient;
use doppler_core::api::ApiClient;
use doppler_core::config::ConfigStore;
use doppler_core::config::EffectiveConfig;
use doppler_core::config::default_config_file;
use doppler_core::config::normalize_scope;
use doppler_core::default_client::ClientOptions;
use doppler_core::retry::RetryPolicy;
use doppler_keyring_store::DefaultKeyringStore;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalArgs;
use crate::output::Printer;

pub struct CommandContext {
    pub global: GlobalArgs,
    pub store: ConfigStore,
    /// Normalized scope the command reads and writes.
    pub scope: String,
    pub config: EffectiveConfig,
    pub printer: Printer,
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Loads the config file and resolves options for the command's scope.
    /// `default_scope` applies when `--scope` is not given.
    pub fn load(global: GlobalArgs, cancel: CancellationToken, default_scope: &str) -> anyhow::Result<Self> {
        let path = match &global.configuration {
            Some(path) => path.clone(),
            None => default_config_file()?,
        };
        let store = ConfigStore::load(path.clone())
            .with_context(|| format!("failed to load configuration {}", path.display()))?
            .with_keyring(Arc::new(DefaultKeyringStore));
        let scope = global.scope.as_deref().unwrap_or(default_scope);
        let scope = normalize_scope(scope)?;
        let config = store.resolve(&scope, &global.overrides(), !global.no_read_env);
        tracing::debug!("resolved configuration for scope {scope}");
        Ok(Self {
            printer: Printer::new(global.json),
            global,
            store,
            scope,
            config,
            cancel,
        })
    }

    /// Re-resolves after the store changed.
    pub fn refresh(&mut self) {
        self.config = self
            .store
            .resolve(&self.scope, &self.global.overrides(), !self.global.no_read_env);
    }

    pub fn http_client(&self) -> anyhow::Result<HttpClient> {
        let options = ClientOptions {
            timeout: self.global.request_timeout(),
            verify_tls: self.config.verify_tls(),
        };
        let policy = RetryPolicy::default().with_max_attempts(self.global.attempts.max(1));
        Ok(HttpClient::new(&self.config.api_host.value, &options)?
            .with_policy(policy)
            .with_cancellation(self.cancel.clone()))
    }

    /// Client authenticated with the resolved token.
    pub fn api(&self) -> anyhow::Result<ApiClient> {
        let token = self.token()?;
        Ok(ApiClient::new(self.http_client()?, token))
    }

    /// Client for endpoints that need no token.
    pub fn anonymous_api(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::new(self.http_client()?, ""))
    }

    pub fn token(&self) -> anyhow::Result<String> {
        let token = self.config.token.value.trim();
        if token.is_empty() {
            bail!("you must provide a token; run `doppler login` or pass --token");
        }
        Ok(token.to_string())
    }

    pub fn project(&self) -> anyhow::Result<String> {
        non_empty(&self.config.project.value, "project", "--project")
    }

    pub fn config_name(&self) -> anyhow::Result<String> {
        non_empty(&self.config.config.value, "config", "--config")
    }

    /// `explicit` if given, otherwise the resolved project.
    pub fn project_or(&self, explicit: Option<&str>) -> anyhow::Result<String> {
        match explicit {
            Some(project) if !project.is_empty() => Ok(project.to_string()),
            _ => self.project(),
        }
    }

    pub fn config_or(&self, explicit: Option<&str>) -> anyhow::Result<String> {
        match explicit {
            Some(config) if !config.is_empty() => Ok(config.to_string()),
            _ => self.config_name(),
        }
    }
}

fn non_empty(value: &str, what: &str, flag: &str) -> anyhow::Result<String> {
    if value.is_empty() {
        bail!("you must specify a {what}; run `doppler setup` or pass {flag}");
    }
    Ok(value.to_string())
}
