use crate::{Error, Identity, Object, ResourceRef};
use kube::api::ResourceExt;

/// Typed access to the cluster's object store on behalf of one identity.
///
/// Implementations never retry: every error is returned to the caller, which
/// owns the retry policy.
#[async_trait::async_trait]
pub trait Resources: Send + Sync {
    /// The identity every request is issued as.
    fn identity(&self) -> &Identity;

    async fn get<K: Object>(&self, target: &ResourceRef<K>) -> Result<K, Error>;

    async fn create<K: Object>(&self, obj: &K) -> Result<K, Error>;

    /// Deletes `obj`. A missing object is reported as [`Error::NotFound`].
    async fn delete<K: Object>(&self, obj: &K) -> Result<(), Error>;
}

/// A [`Resources`] client backed by the Kubernetes API.
#[derive(Clone)]
pub struct ResourceClient {
    client: kube::Client,
    identity: Identity,
}

// === impl ResourceClient ===

impl ResourceClient {
    pub(crate) fn new(client: kube::Client, identity: Identity) -> Self {
        Self { client, identity }
    }
}

#[async_trait::async_trait]
impl Resources for ResourceClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn get<K: Object>(&self, target: &ResourceRef<K>) -> Result<K, Error> {
        tracing::trace!(%target, identity = %self.identity, "Getting");
        let api = K::api(self.client.clone(), target.namespace());
        let obj = api.get(target.name()).await?;
        Ok(obj)
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K, Error> {
        let namespace = obj.namespace();
        tracing::debug!(
            kind = %K::kind(&()),
            name = %obj.name_any(),
            namespace = namespace.as_deref().unwrap_or(""),
            identity = %self.identity,
            "Creating",
        );
        let api = K::api(self.client.clone(), namespace.as_deref());
        let created = api.create(&kube::api::PostParams::default(), obj).await?;
        Ok(created)
    }

    async fn delete<K: Object>(&self, obj: &K) -> Result<(), Error> {
        let namespace = obj.namespace();
        let name = obj.name_any();
        tracing::debug!(
            kind = %K::kind(&()),
            %name,
            namespace = namespace.as_deref().unwrap_or(""),
            identity = %self.identity,
            "Deleting",
        );
        let api = K::api(self.client.clone(), namespace.as_deref());
        api.delete(&name, &kube::api::DeleteParams::background())
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
