//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::connector::{AmazonAdsConnector, Connector};
use crate::error::{Error, Result};
use crate::output::{MessageSink, StdoutSink};
use crate::state::StateManager;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
    connector: AmazonAdsConnector,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            connector: AmazonAdsConnector::new(),
        }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Spec => self.spec(),
            Commands::Check => self.check().await,
            Commands::Discover => self.discover().await,
            Commands::Read { .. } => self.read().await,
        }
    }

    /// Load config; inline JSON takes precedence over the file
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json_str) = &self.cli.config_json {
            return TapConfig::from_str(json_str);
        }
        match &self.cli.config {
            Some(path) => TapConfig::from_path(path),
            None => Err(Error::config(
                "No configuration given (use --config or --config-json)",
            )),
        }
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        match &self.cli.state {
            Some(path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }

    /// Print the configuration specification
    fn spec(&self) -> Result<()> {
        let spec = self.connector.spec();
        output_message(&json!({
            "type": "SPEC",
            "spec": {
                "name": spec.name,
                "title": spec.title,
                "description": spec.description,
                "connectionSpecification": spec.connection_specification
            }
        }));
        Ok(())
    }

    /// Check credentials and profile access
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let result = self.connector.check(&config).await?;

        let (status, message) = if result.success {
            ("SUCCEEDED", "Connection successful".to_string())
        } else {
            (
                "FAILED",
                format!(
                    "Connection failed: {}",
                    result.message.as_deref().unwrap_or("unknown error")
                ),
            )
        };
        output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": {
                "status": status,
                "message": message
            }
        }));

        if result.success {
            Ok(())
        } else {
            Err(Error::ConnectionCheck {
                message: result.message.unwrap_or_default(),
            })
        }
    }

    /// Print the catalog
    async fn discover(&self) -> Result<()> {
        let config = self.load_config()?;
        let catalog = self.connector.discover(&config).await?;
        output_message(&catalog);
        Ok(())
    }

    /// Run a sync; stdout carries the message protocol
    async fn read(&self) -> Result<()> {
        let config = self.load_config()?;
        let state = self.load_state()?;
        let streams = self.cli.command.selected_streams();
        let sink: Arc<dyn MessageSink> = Arc::new(StdoutSink::new());

        let cancelled = Arc::new(AtomicBool::new(false));
        let signal_flag = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current request");
                signal_flag.store(true, Ordering::SeqCst);
            }
        });

        let report = self
            .connector
            .read(&config, &streams, state, sink, cancelled)
            .await?;

        for failure in &report.failures {
            error!(
                profile_id = %failure.profile_id,
                stream = %failure.stream,
                error = %failure.error,
                "Stream did not complete"
            );
        }

        if report.cancelled {
            return Err(Error::Cancelled);
        }
        if !report.failures.is_empty() {
            return Err(Error::Other(format!(
                "{} profile/stream pair(s) failed",
                report.failures.len()
            )));
        }

        info!(
            records = report.stats.records_emitted,
            streams = report.stats.streams_completed,
            "Read complete"
        );
        Ok(())
    }
}

/// Write a single JSON line to stdout
fn output_message(msg: &Value) {
    println!("{}", serde_json::to_string(msg).unwrap_or_default());
}
