//! The managed-cluster validating webhook suite.

use crate::{
    fixtures::{self, PRIVILEGED_NAMESPACE, UNPRIVILEGED_NAMESPACE},
    wait::{self, daemonset_ready, ConditionWaiter, Outcome, WaitSpec},
    Error, ErrorKind, Identity, Impersonate, Label, Object, ResourceRef, Resources, ServiceAccount,
};
use k8s_openapi::api::{
    apps::v1::DaemonSet,
    core::v1::{ConfigMap, Namespace, Pod, Secret, Service},
};
use kube::ResourceExt;
use std::{fmt, future::Future};
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

pub const SUITE_NAME: &str = "Managed Cluster Validating Webhooks";

pub const SUITE_LABELS: [Label; 3] = [Label::Osd, Label::Rosa, Label::Sts];

/// The scenarios of the suite, in the order they run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    Exists,
    PodsBlocked,
    PodsAllowed,
}

#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    /// The project whose `dedicated-admin-project` service account may
    /// schedule onto privileged nodes.
    pub admin_project: String,
    pub daemonset_timeout: Duration,
    pub poll_interval: Duration,
    pub create_timeout: Duration,
    pub delete_timeout: Duration,
}

/// Whether a request was admitted or, if not, how it was refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(ErrorKind),
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to build a client for {actor}")]
    Client {
        actor: String,
        #[source]
        source: Error,
    },

    #[error("{target} is missing")]
    Missing {
        target: String,
        #[source]
        source: Error,
    },

    #[error("{target} did not become ready: {reason}")]
    NotReady {
        target: String,
        reason: String,
        #[source]
        source: Option<Error>,
    },

    #[error("{step}: creating pod in {namespace} as {actor}: expected {expected}, observed {observed}")]
    Unexpected {
        step: &'static str,
        actor: String,
        namespace: String,
        expected: Verdict,
        observed: Verdict,
        #[source]
        source: Option<Error>,
    },

    #[error("failed to delete pod {namespace}/{name} as {actor}")]
    Cleanup {
        name: String,
        namespace: String,
        actor: String,
        #[source]
        source: Error,
    },

    #[error("scenario exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),

    #[error("scenario cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub enum ScenarioResult {
    Passed,
    Failed(ScenarioError),
    Skipped,
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    results: Vec<(Scenario, ScenarioResult)>,
}

/// Runs the suite's scenarios using clients from an [`Impersonate`] factory.
pub struct ScenarioRunner<F> {
    factory: F,
    config: ScenarioConfig,
    cancel: CancellationToken,
}

// === impl Scenario ===

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Exists, Scenario::PodsBlocked, Scenario::PodsAllowed];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Exists => "exists and is running",
            Self::PodsBlocked => "created pods scheduled onto master and infra nodes are blocked",
            Self::PodsAllowed => "created pods scheduled onto master and infra nodes are allowed",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// === impl ScenarioConfig ===

impl ScenarioConfig {
    pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    pub fn new(admin_project: impl Into<String>) -> Self {
        Self {
            admin_project: admin_project.into(),
            daemonset_timeout: wait::DEFAULT_TIMEOUT,
            poll_interval: wait::DEFAULT_POLL_INTERVAL,
            create_timeout: Self::DEFAULT_CREATE_TIMEOUT,
            delete_timeout: Self::DEFAULT_DELETE_TIMEOUT,
        }
    }

    /// The time allotted to a scenario that creates and deletes a pod.
    pub fn pod_budget(&self) -> Duration {
        self.create_timeout + self.delete_timeout
    }
}

// === impl Verdict ===

impl Verdict {
    fn of<T>(res: &Result<T, Error>) -> Self {
        match res {
            Ok(_) => Self::Allowed,
            Err(e) => Self::Denied(e.kind()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => f.write_str("success"),
            Self::Denied(kind) => write!(f, "{kind} error"),
        }
    }
}

// === impl ScenarioResult ===

impl ScenarioResult {
    #[inline]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

// === impl SuiteReport ===

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_passed())
    }

    pub fn results(&self) -> &[(Scenario, ScenarioResult)] {
        &self.results
    }

    pub fn result(&self, scenario: Scenario) -> Option<&ScenarioResult> {
        self.results
            .iter()
            .find(|(s, _)| *s == scenario)
            .map(|(_, r)| r)
    }
}

// === impl ScenarioRunner ===

impl<F: Impersonate> ScenarioRunner<F> {
    pub fn new(factory: F, config: ScenarioConfig) -> Self {
        Self {
            factory,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops in-flight scenarios once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs every scenario in order. Once a scenario fails, the remaining
    /// scenarios are skipped.
    pub async fn run_suite(&self) -> SuiteReport {
        let mut report = SuiteReport::default();
        let mut failed = false;
        for scenario in Scenario::ALL {
            if failed {
                info!(%scenario, "Skipped");
                report.results.push((scenario, ScenarioResult::Skipped));
                continue;
            }

            let result = match self.run(scenario).await {
                Ok(()) => ScenarioResult::Passed,
                Err(error) => {
                    failed = true;
                    ScenarioResult::Failed(error)
                }
            };
            report.results.push((scenario, result));
        }
        report
    }

    pub async fn run(&self, scenario: Scenario) -> Result<(), ScenarioError> {
        let span = info_span!("scenario", %scenario);
        let res = match scenario {
            Scenario::Exists => self.exists_and_is_running().instrument(span).await,
            Scenario::PodsBlocked => {
                self.within_pod_budget(self.pods_are_blocked())
                    .instrument(span)
                    .await
            }
            Scenario::PodsAllowed => {
                self.within_pod_budget(self.pods_are_allowed())
                    .instrument(span)
                    .await
            }
        };
        match &res {
            Ok(()) => info!(%scenario, "Passed"),
            Err(error) => tracing::error!(%scenario, %error, "Failed"),
        }
        res
    }

    async fn exists_and_is_running(&self) -> Result<(), ScenarioError> {
        let client = self.client(Identity::ambient())?;

        info!("checking the namespace exists");
        self.expect_exists(&client, ResourceRef::<Namespace>::cluster(fixtures::WEBHOOK_NAMESPACE))
            .await?;

        info!("checking the configmap exists");
        self.expect_exists(
            &client,
            ResourceRef::<ConfigMap>::namespaced(
                fixtures::WEBHOOK_CONFIGMAP,
                fixtures::WEBHOOK_NAMESPACE,
            ),
        )
        .await?;

        info!("checking the secret exists");
        self.expect_exists(
            &client,
            ResourceRef::<Secret>::namespaced(fixtures::WEBHOOK_SECRET, fixtures::WEBHOOK_NAMESPACE),
        )
        .await?;

        info!("checking the service exists");
        self.expect_exists(
            &client,
            ResourceRef::<Service>::namespaced(
                fixtures::WEBHOOK_SERVICE,
                fixtures::WEBHOOK_NAMESPACE,
            ),
        )
        .await?;

        info!("checking the daemonset is available");
        let target = ResourceRef::<DaemonSet>::namespaced(
            fixtures::WEBHOOK_DAEMONSET,
            fixtures::WEBHOOK_NAMESPACE,
        );
        let spec = WaitSpec::new(target.clone(), daemonset_ready)
            .timeout(self.config.daemonset_timeout)
            .poll_interval(self.config.poll_interval);
        let outcome = ConditionWaiter::new(&client)
            .with_cancellation(self.cancel.child_token())
            .wait_for(spec)
            .await;

        let target = target.to_string();
        match outcome {
            Outcome::Success(_) => Ok(()),
            Outcome::Cancelled => Err(ScenarioError::Cancelled),
            Outcome::Timeout { elapsed, polls } => Err(ScenarioError::NotReady {
                target,
                reason: format!("timed out after {elapsed:?} and {polls} polls"),
                source: None,
            }),
            Outcome::Transient(error) => Err(ScenarioError::NotReady {
                target,
                reason: "timed out while the API was unavailable".to_string(),
                source: Some(error),
            }),
            Outcome::Fatal(error) => Err(ScenarioError::NotReady {
                target,
                reason: "polling failed".to_string(),
                source: Some(error),
            }),
        }
    }

    async fn pods_are_blocked(&self) -> Result<(), ScenarioError> {
        let ambient = self.client(Identity::ambient())?;
        let dedicated_admin = self
            .factory
            .as_dedicated_admin()
            .map_err(|source| ScenarioError::Client {
                actor: "dedicated-admin".to_string(),
                source,
            })?;
        let user = self.client(Identity::user(
            fixtures::ARBITRARY_USER,
            std::iter::empty::<String>(),
        ))?;

        let pod = fixtures::test_pod();
        let attempts = [
            (
                "impersonating dedicated-admin and using a privileged namespace",
                &dedicated_admin,
                PRIVILEGED_NAMESPACE,
            ),
            (
                "impersonating a random user and using a privileged namespace",
                &user,
                PRIVILEGED_NAMESPACE,
            ),
            (
                "impersonating a random user and using an unprivileged namespace",
                &user,
                UNPRIVILEGED_NAMESPACE,
            ),
        ];
        for (step, client, namespace) in attempts {
            let pod = fixtures::with_namespace(pod.clone(), namespace);
            let res = expect_create(step, client, &pod, Verdict::Denied(ErrorKind::Forbidden)).await;
            let cleanup = delete_if_exists(&ambient, &pod).await;
            settle(res, cleanup)?;
        }
        Ok(())
    }

    async fn pods_are_allowed(&self) -> Result<(), ScenarioError> {
        let sa = ServiceAccount {
            namespace: self.config.admin_project.clone(),
            name: fixtures::ADMIN_PROJECT_SERVICE_ACCOUNT.to_string(),
        };
        let client = self
            .factory
            .for_service_account(&sa.to_string())
            .map_err(|source| ScenarioError::Client {
                actor: sa.to_string(),
                source,
            })?;

        let pod = fixtures::with_namespace(fixtures::test_pod(), PRIVILEGED_NAMESPACE);
        let res = expect_create(
            "impersonating dedicated-admin-project ServiceAccount",
            &client,
            &pod,
            Verdict::Allowed,
        )
        .await;
        let cleanup = delete_if_exists(&client, &pod).await;
        settle(res, cleanup)
    }

    async fn expect_exists<K: Object>(
        &self,
        client: &F::Client,
        target: ResourceRef<K>,
    ) -> Result<(), ScenarioError> {
        let res = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ScenarioError::Cancelled),
            res = client.get(&target) => res,
        };
        match res {
            Ok(_) => Ok(()),
            Err(source) => Err(ScenarioError::Missing {
                target: target.to_string(),
                source,
            }),
        }
    }

    /// Bounds a pod scenario by its deadline and by cancellation. Remaining
    /// steps, including cleanup, are abandoned when either fires.
    async fn within_pod_budget(
        &self,
        scenario: impl Future<Output = Result<(), ScenarioError>>,
    ) -> Result<(), ScenarioError> {
        let budget = self.config.pod_budget();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScenarioError::Cancelled),
            res = time::timeout(budget, scenario) => match res {
                Ok(res) => res,
                Err(_) => Err(ScenarioError::DeadlineExceeded(budget)),
            },
        }
    }

    fn client(&self, identity: Identity) -> Result<F::Client, ScenarioError> {
        let actor = identity.to_string();
        self.factory
            .client_for(identity)
            .map_err(|source| ScenarioError::Client { actor, source })
    }
}

async fn expect_create<C: Resources>(
    step: &'static str,
    client: &C,
    pod: &Pod,
    expected: Verdict,
) -> Result<(), ScenarioError> {
    info!(step, identity = %client.identity(), "Creating pod");
    let res = client.create(pod).await;
    let observed = Verdict::of(&res);
    if observed == expected {
        return Ok(());
    }

    Err(ScenarioError::Unexpected {
        step,
        actor: client.identity().to_string(),
        namespace: pod.namespace().unwrap_or_default(),
        expected,
        observed,
        source: res.err(),
    })
}

/// Deletes the pod, tolerating its absence.
async fn delete_if_exists<C: Resources>(client: &C, pod: &Pod) -> Result<(), ScenarioError> {
    match client.delete(pod).await {
        Ok(()) => Ok(()),
        Err(error) if error.is_not_found() => Ok(()),
        Err(source) => Err(ScenarioError::Cleanup {
            name: pod.name_any(),
            namespace: pod.namespace().unwrap_or_default(),
            actor: client.identity().to_string(),
            source,
        }),
    }
}

/// A scenario failure takes precedence over a failure to clean up after it.
fn settle(
    res: Result<(), ScenarioError>,
    cleanup: Result<(), ScenarioError>,
) -> Result<(), ScenarioError> {
    match (res, cleanup) {
        (Ok(()), cleanup) => cleanup,
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(cleanup)) => {
            tracing::warn!(error = %cleanup, "Cleanup failed after scenario failure");
            Err(error)
        }
    }
}
