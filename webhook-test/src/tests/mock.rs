//! An in-memory cluster that records every request and the identity it was
//! issued as.

use crate::{Error, Identity, Impersonate, Object, ResourceRef, Resources};
use kube::{api::ResourceExt, core::ErrorResponse};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};
use tokio::time::Duration;

type Key = (String, Option<String>, String);

type Admission = Arc<dyn Fn(&Identity, Option<&str>) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

#[derive(Clone)]
pub struct MockClient {
    identity: Identity,
    state: Arc<Mutex<State>>,
}

/// A scripted response to a `get`.
#[derive(Clone, Debug)]
pub enum Reply {
    Object(serde_json::Value),
    Status(u16),
    /// Stalls the request for the given time before it fails with a 504.
    Stall(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub verb: &'static str,
    pub principal: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, serde_json::Value>,
    replies: BTreeMap<Key, VecDeque<Reply>>,
    delete_status: Option<u16>,
    create_delay: Option<Duration>,
    admission: Option<Admission>,
    requests: Vec<Request>,
}

pub fn status(code: u16) -> Error {
    let reason = match code {
        403 => "Forbidden",
        404 => "NotFound",
        409 => "AlreadyExists",
        503 => "ServiceUnavailable",
        _ => "Unknown",
    };
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("mock {reason}"),
        reason: reason.to_string(),
        code,
    }))
}

fn key<K: Object>(namespace: Option<&str>, name: &str) -> Key {
    (
        K::kind(&()).into_owned(),
        namespace.map(ToString::to_string),
        name.to_string(),
    )
}

// === impl MockCluster ===

impl MockCluster {
    pub fn insert<K: Object>(&self, obj: &K) {
        let key = key::<K>(obj.namespace().as_deref(), &obj.name_any());
        let value = serde_json::to_value(obj).expect("object must serialize");
        self.state.lock().objects.insert(key, value);
    }

    pub fn contains<K: Object>(&self, target: &ResourceRef<K>) -> bool {
        let key = key::<K>(target.namespace(), target.name());
        self.state.lock().objects.contains_key(&key)
    }

    pub fn count<K: Object>(&self) -> usize {
        let kind = K::kind(&());
        self.state
            .lock()
            .objects
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    /// Queues responses to `get`s of `target`, served before stored state.
    pub fn script<K: Object>(&self, target: &ResourceRef<K>, replies: impl IntoIterator<Item = Reply>) {
        let key = key::<K>(target.namespace(), target.name());
        self.state
            .lock()
            .replies
            .entry(key)
            .or_default()
            .extend(replies);
    }

    /// Decides whether a pod create by an identity in a namespace is admitted.
    pub fn admit_pods(&self, f: impl Fn(&Identity, Option<&str>) -> bool + Send + Sync + 'static) {
        self.state.lock().admission = Some(Arc::new(f));
    }

    pub fn fail_deletes(&self, code: u16) {
        self.state.lock().delete_status = Some(code);
    }

    pub fn delay_creates(&self, delay: Duration) {
        self.state.lock().create_delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    pub fn requests_of(&self, verb: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.verb == verb)
            .collect()
    }
}

impl Impersonate for MockCluster {
    type Client = MockClient;

    fn client_for(&self, identity: Identity) -> Result<MockClient, Error> {
        Ok(MockClient {
            identity,
            state: self.state.clone(),
        })
    }
}

impl Reply {
    pub fn object<K: Object>(obj: &K) -> Self {
        Self::Object(serde_json::to_value(obj).expect("object must serialize"))
    }
}

// === impl MockClient ===

impl MockClient {
    fn record(&self, state: &mut State, verb: &'static str, (kind, namespace, name): &Key) {
        state.requests.push(Request {
            verb,
            principal: self.identity.principal().to_string(),
            kind: kind.clone(),
            namespace: namespace.clone(),
            name: name.clone(),
        });
    }
}

#[async_trait::async_trait]
impl Resources for MockClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn get<K: Object>(&self, target: &ResourceRef<K>) -> Result<K, Error> {
        let key = key::<K>(target.namespace(), target.name());
        let scripted = {
            let mut state = self.state.lock();
            self.record(&mut state, "get", &key);
            state.replies.get_mut(&key).and_then(VecDeque::pop_front)
        };
        let value = match scripted {
            Some(Reply::Object(value)) => value,
            Some(Reply::Status(code)) => return Err(status(code)),
            Some(Reply::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                return Err(status(504));
            }
            None => {
                let state = self.state.lock();
                state.objects.get(&key).cloned().ok_or_else(|| status(404))?
            }
        };
        Ok(serde_json::from_value(value).expect("object must deserialize"))
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K, Error> {
        let delay = self.state.lock().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        // Let concurrent requests interleave.
        tokio::task::yield_now().await;

        let key = key::<K>(obj.namespace().as_deref(), &obj.name_any());
        let mut state = self.state.lock();
        self.record(&mut state, "create", &key);

        if key.0 == "Pod" {
            if let Some(admit) = state.admission.clone() {
                if !admit(&self.identity, key.1.as_deref()) {
                    return Err(status(403));
                }
            }
        }
        if state.objects.contains_key(&key) {
            return Err(status(409));
        }
        let value = serde_json::to_value(obj).expect("object must serialize");
        state.objects.insert(key, value);
        Ok(obj.clone())
    }

    async fn delete<K: Object>(&self, obj: &K) -> Result<(), Error> {
        let key = key::<K>(obj.namespace().as_deref(), &obj.name_any());
        let mut state = self.state.lock();
        self.record(&mut state, "delete", &key);

        if let Some(code) = state.delete_status {
            return Err(status(code));
        }
        match state.objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(status(404)),
        }
    }
}
