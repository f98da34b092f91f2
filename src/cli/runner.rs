//! CLI runner - executes commands

use crate::auth::CredentialRecord;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{load_config, ClientConfig};
use crate::error::{Error, Result, ResultExt};
use crate::http::{ApiClient, ApiResponse, RequestDescriptor};
use crate::types::Method;
use serde_json::{json, Value};
use std::time::Duration;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Request {
                method,
                path,
                data,
                headers,
                timeout,
            } => {
                self.request(*method, path, data.as_deref(), headers, *timeout)
                    .await
            }
            Commands::Validate => self.validate(),
        }
    }

    /// Load configuration from file, then apply command-line overrides
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.cli.config {
            Some(path) => load_config(path)?,
            None => ClientConfig::default(),
        };

        if let Some(base_url) = &self.cli.base_url {
            config.base_url.clone_from(base_url);
        }

        config.validate()?;
        Ok(config)
    }

    fn credentials(&self) -> CredentialRecord {
        CredentialRecord {
            access_token: self.cli.access_token.clone(),
            refresh_token: self.cli.refresh_token.clone(),
            csrf_token: None,
        }
    }

    /// Send one request and print the response
    async fn request(
        &self,
        method: Method,
        path: &str,
        data: Option<&str>,
        headers: &[String],
        timeout: Option<u64>,
    ) -> Result<()> {
        let config = self.load_config()?;
        let client = ApiClient::builder(config)
            .on_sign_out(|reason| eprintln!("Session ended: {reason}. Please sign in again."))
            .build()?;
        client.login(self.credentials());

        let mut descriptor = RequestDescriptor::new(method, path);
        if let Some(data) = data {
            let body: Value =
                serde_json::from_str(data).context("Invalid JSON in --data")?;
            descriptor = descriptor.json(body);
        }
        for header in headers {
            let (name, value) = parse_header(header)?;
            descriptor = descriptor.header(name, value);
        }
        if let Some(seconds) = timeout {
            descriptor = descriptor.timeout(Duration::from_secs(seconds));
        }

        let response = client.request(descriptor).await?;
        self.output_response(&response);
        Ok(())
    }

    /// Validate the client configuration
    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;

        self.output_message(&json!({
            "valid": true,
            "baseUrl": config.base_url,
            "timeoutMs": config.timeout.as_millis() as u64,
            "maxRetries": config.max_retries,
            "baseDelayMs": config.base_delay.as_millis() as u64,
            "backoff": format!("{:?}", config.backoff_type),
            "refreshPath": config.refresh_path,
            "csrfHeader": config.csrf_header,
            "rateLimited": config.rate_limit.is_some(),
        }));

        Ok(())
    }

    fn output_response(&self, response: &ApiResponse) {
        match response.json::<Value>() {
            Ok(Value::Null) if response.body().is_empty() => {
                println!("{}", response.status());
            }
            Ok(value) => self.output_message(&value),
            Err(_) => println!("{}", response.text()),
        }
    }

    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Split a `Name: value` header argument
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::config(format!("Invalid header '{raw}', expected 'Name: value'")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::config(format!("Invalid header '{raw}', empty name")));
    }
    Ok((name, value.trim()))
}
