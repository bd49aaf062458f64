use kube::{
    api::Api,
    core::{ClusterResourceScope, NamespaceResourceScope},
    Resource, ResourceExt,
};
use std::{fmt, marker::PhantomData};

/// A Kubernetes object type that can be fetched, created, and deleted by a
/// [`Resources`](crate::Resources) client.
pub trait Object:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Builds an API handle for this type, namespaced when the type is.
    fn api(client: kube::Client, namespace: Option<&str>) -> Api<Self>;
}

/// Resolves an [`Api`] for a resource according to its scope.
pub trait ApiScope {
    fn api<K>(client: kube::Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>;
}

/// Identifies a remote object of type `K` without holding its content.
pub struct ResourceRef<K> {
    name: String,
    namespace: Option<String>,
    _kind: PhantomData<fn() -> K>,
}

// === impl Object ===

impl<K> Object for K
where
    K: Resource<DynamicType = ()>
        + Clone
        + fmt::Debug
        + serde::Serialize
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
    K::Scope: ApiScope,
{
    #[inline]
    fn api(client: kube::Client, namespace: Option<&str>) -> Api<Self> {
        <K::Scope as ApiScope>::api(client, namespace)
    }
}

// === impl ApiScope ===

impl ApiScope for NamespaceResourceScope {
    fn api<K>(client: kube::Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::default_namespaced(client),
        }
    }
}

impl ApiScope for ClusterResourceScope {
    fn api<K>(client: kube::Client, _: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        Api::all(client)
    }
}

// === impl ResourceRef ===

impl<K: Resource<DynamicType = ()>> ResourceRef<K> {
    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            _kind: PhantomData,
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            _kind: PhantomData,
        }
    }

    /// Refers to an existing object by its metadata.
    pub fn of(obj: &K) -> Self {
        Self {
            name: obj.name_any(),
            namespace: obj.namespace(),
            _kind: PhantomData,
        }
    }

    pub fn kind(&self) -> String {
        K::kind(&()).into_owned()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl<K> Clone for ResourceRef<K> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: Resource<DynamicType = ()>> fmt::Debug for ResourceRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("kind", &self.kind())
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl<K: Resource<DynamicType = ()>> fmt::Display for ResourceRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind().to_lowercase(), ns, self.name),
            None => write!(f, "{}/{}", self.kind().to_lowercase(), self.name),
        }
    }
}
