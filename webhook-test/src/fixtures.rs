//! Well-known names and test objects.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, Toleration};
use kube::api::ObjectMeta;
use maplit::{btreemap, convert_args};

pub const WEBHOOK_NAMESPACE: &str = "openshift-validation-webhook";
pub const WEBHOOK_SERVICE: &str = "validation-webhook";
pub const WEBHOOK_DAEMONSET: &str = "validation-webhook";
pub const WEBHOOK_CONFIGMAP: &str = "webhook-cert";
pub const WEBHOOK_SECRET: &str = "webhook-cert";

/// A namespace in which dedicated admins may not schedule onto privileged
/// nodes, but the admin project service account may.
pub const PRIVILEGED_NAMESPACE: &str = "openshift-backplane";
pub const UNPRIVILEGED_NAMESPACE: &str = "openshift-logging";

/// An arbitrary, unprivileged user.
pub const ARBITRARY_USER: &str = "majora";

pub const ADMIN_PROJECT_SERVICE_ACCOUNT: &str = "dedicated-admin-project";

const TEST_POD_PREFIX: &str = "osde2e";
const TEST_IMAGE: &str = "registry.access.redhat.com/ubi8/ubi-minimal";

/// Returns a pod with a random name that tolerates the master and infra node
/// taints. It has no namespace; see [`with_namespace`].
pub fn test_pod() -> Pod {
    named_test_pod(format!("{TEST_POD_PREFIX}-{}", random_suffix(6)))
}

pub fn named_test_pod(name: impl Into<String>) -> Pod {
    let toleration = |role: &str, value: &str| Toleration {
        key: Some(format!("node-role.kubernetes.io/{role}")),
        value: Some(value.to_string()),
        effect: Some("NoSchedule".to_string()),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(name.into()),
            labels: Some(convert_args!(btreemap!(
                "app.kubernetes.io/managed-by" => "validation-webhook-test",
            ))),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "test".to_string(),
                image: Some(TEST_IMAGE.to_string()),
                ..Default::default()
            }],
            tolerations: Some(vec![
                toleration("master", "toleration-key-value"),
                toleration("infra", "toleration-key-value2"),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn with_namespace(mut pod: Pod, namespace: &str) -> Pod {
    pod.metadata.namespace = Some(namespace.to_string());
    pod
}

pub fn random_suffix(len: usize) -> String {
    use rand::Rng;

    struct LowercaseAlphanumeric;

    // Modified from `rand::distributions::Alphanumeric`
    //
    // Copyright 2018 Developers of the Rand project
    // Copyright (c) 2014 The Rust Project Developers
    //
    // Licensed under the Apache License, Version 2.0 (the "License");
    // you may not use this file except in compliance with the License.
    // You may obtain a copy of the License at
    //
    //     http://www.apache.org/licenses/LICENSE-2.0
    //
    // Unless required by applicable law or agreed to in writing, software
    // distributed under the License is distributed on an "AS IS" BASIS,
    // WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    // See the License for the specific language governing permissions and
    // limitations under the License.
    impl rand::distributions::Distribution<u8> for LowercaseAlphanumeric {
        fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> u8 {
            const RANGE: u32 = 26 + 10;
            const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
            loop {
                let var = rng.next_u32() >> (32 - 6);
                if var < RANGE {
                    return CHARSET[var as usize];
                }
            }
        }
    }

    rand::thread_rng()
        .sample_iter(&LowercaseAlphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
