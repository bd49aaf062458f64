//! Runs the suite against the cluster of the current kubeconfig context.
//!
//! `VALIDATE_WEBHOOKS_ADMIN_PROJECT` must name the project that owns the
//! `dedicated-admin-project` service account.

use validation_webhook_test::{
    fixtures, init_tracing, scenario::Scenario, IdentityFactory, Impersonate, Resources,
    ScenarioConfig, ScenarioRunner,
};

async fn runner() -> ScenarioRunner<IdentityFactory> {
    let admin_project = std::env::var("VALIDATE_WEBHOOKS_ADMIN_PROJECT")
        .expect("VALIDATE_WEBHOOKS_ADMIN_PROJECT must be set");
    let factory = IdentityFactory::infer()
        .await
        .expect("failed to configure client");
    ScenarioRunner::new(factory, ScenarioConfig::new(admin_project))
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires a managed cluster"]
async fn exists_and_is_running() {
    let _tracing = init_tracing();
    runner()
        .await
        .run(Scenario::Exists)
        .await
        .expect("webhook must be installed and available");
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires a managed cluster"]
async fn pods_on_privileged_nodes_are_blocked() {
    let _tracing = init_tracing();
    runner()
        .await
        .run(Scenario::PodsBlocked)
        .await
        .expect("pods must be rejected");
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires a managed cluster"]
async fn pods_on_privileged_nodes_are_allowed_for_admin_project() {
    let _tracing = init_tracing();
    runner()
        .await
        .run(Scenario::PodsAllowed)
        .await
        .expect("pod must be admitted");
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires a managed cluster"]
async fn arbitrary_user_is_forbidden() {
    let _tracing = init_tracing();
    let factory = IdentityFactory::infer()
        .await
        .expect("failed to configure client");
    let client = factory
        .for_user(fixtures::ARBITRARY_USER, std::iter::empty::<String>())
        .expect("failed to build client");

    let pod = fixtures::with_namespace(fixtures::test_pod(), fixtures::PRIVILEGED_NAMESPACE);
    let err = client
        .create(&pod)
        .await
        .expect_err("pod must not be admitted");
    assert!(err.is_forbidden(), "{err:?}");

    let ambient = factory.ambient().expect("failed to build client");
    if let Err(error) = ambient.delete(&pod).await {
        assert!(error.is_not_found(), "failed to delete test pod: {error:?}");
    }
}
