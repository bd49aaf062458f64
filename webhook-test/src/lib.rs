#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! End-to-end checks for a managed cluster's validating admission webhook.
//!
//! The harness is built from two reusable pieces: a [`ConditionWaiter`] that
//! polls remote state until a predicate holds, and an [`IdentityFactory`]
//! that hands out API clients impersonating arbitrary users, groups, and
//! service accounts. The [`scenario`] module composes them into the suite.

mod client;
mod error;
pub mod fixtures;
mod identity;
pub mod labels;
mod resource;
pub mod scenario;
pub mod wait;

#[cfg(test)]
mod tests;

pub use self::{
    client::{ResourceClient, Resources},
    error::{Error, ErrorKind},
    identity::{
        Identity, IdentityFactory, Impersonate, ServiceAccount, AUTHENTICATED, AUTHENTICATED_OAUTH,
    },
    labels::{Label, LabelFilter},
    resource::{ApiScope, Object, ResourceRef},
    scenario::{ScenarioConfig, ScenarioError, ScenarioRunner},
    wait::{ConditionWaiter, Outcome, WaitSpec},
};

/// Installs a test-scoped tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "validation_webhook_test=trace,warn".parse().unwrap()),
            )
            .finish(),
    )
}
