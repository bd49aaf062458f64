mod mock;

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetStatus};
use kube::api::ObjectMeta;

fn daemonset(desired: i32, current: i32, ready: i32, available: i32) -> DaemonSet {
    DaemonSet {
        metadata: ObjectMeta {
            name: Some(crate::fixtures::WEBHOOK_DAEMONSET.to_string()),
            namespace: Some(crate::fixtures::WEBHOOK_NAMESPACE.to_string()),
            ..Default::default()
        },
        status: Some(DaemonSetStatus {
            desired_number_scheduled: desired,
            current_number_scheduled: current,
            number_ready: ready,
            number_available: Some(available),
            ..Default::default()
        }),
        ..Default::default()
    }
}
