#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use anyhow::{bail, Result};
use clap::Parser;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validation_webhook_test::{
    scenario::{ScenarioResult, SUITE_LABELS, SUITE_NAME},
    IdentityFactory, LabelFilter, ScenarioConfig, ScenarioRunner,
};

#[derive(Debug, Parser)]
#[clap(
    name = "validate-webhooks",
    about = "Checks a managed cluster's validating admission webhook"
)]
struct Args {
    #[clap(
        long,
        default_value = "validation_webhook_test=info,warn",
        env = "VALIDATE_WEBHOOKS_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// Kubeconfig context to use. Defaults to the current context.
    #[clap(long)]
    context: Option<String>,

    /// Project whose `dedicated-admin-project` service account is expected
    /// to be allowed onto privileged nodes.
    #[clap(long, env = "VALIDATE_WEBHOOKS_ADMIN_PROJECT")]
    admin_project: String,

    /// Only run if the suite's labels match, e.g. `ROSA,!HyperShift`.
    #[clap(long)]
    label_filter: Option<LabelFilter>,

    #[clap(long, default_value = "300")]
    daemonset_timeout_secs: u64,

    #[clap(long, default_value = "5000")]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        log_level,
        log_format,
        context,
        admin_project,
        label_filter,
        daemonset_timeout_secs,
        poll_interval_ms,
    } = Args::parse();

    log_format.try_init(log_level)?;

    if let Some(filter) = label_filter {
        if !filter.matches(&SUITE_LABELS) {
            info!(suite = SUITE_NAME, ?filter, "Suite not selected");
            return Ok(());
        }
    }

    let factory = match context {
        Some(context) => IdentityFactory::from_kubeconfig(Some(context)).await?,
        None => IdentityFactory::infer().await?,
    };

    let config = ScenarioConfig {
        daemonset_timeout: Duration::from_secs(daemonset_timeout_secs),
        poll_interval: Duration::from_millis(poll_interval_ms),
        ..ScenarioConfig::new(admin_project)
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling");
                cancel.cancel();
            }
        }
    });

    info!(suite = SUITE_NAME, "Starting");
    let report = ScenarioRunner::new(factory, config)
        .with_cancellation(cancel)
        .run_suite()
        .await;

    for (scenario, result) in report.results() {
        match result {
            ScenarioResult::Passed => info!(%scenario, "PASS"),
            ScenarioResult::Skipped => warn!(%scenario, "SKIP"),
            ScenarioResult::Failed(error) => {
                error!(%scenario, error = %error_chain(error), "FAIL")
            }
        }
    }

    if !report.passed() {
        bail!("{SUITE_NAME} failed");
    }
    Ok(())
}

/// Renders an error and its sources on one line.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    anyhow::Chain::new(error)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validation_webhook_test::{Error, ScenarioError};

    #[test]
    fn error_chain_joins_sources() {
        let error = ScenarioError::Cleanup {
            name: "osde2e-abc12".to_string(),
            namespace: "openshift-backplane".to_string(),
            actor: "<ambient>".to_string(),
            source: Error::InvalidIdentity("nobody".to_string()),
        };
        assert_eq!(
            error_chain(&error),
            "failed to delete pod openshift-backplane/osde2e-abc12 as <ambient>: invalid identity \"nobody\""
        );
    }
}
