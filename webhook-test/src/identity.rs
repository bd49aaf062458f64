use crate::{client::ResourceClient, Error, Resources};
use std::{fmt, str::FromStr};

/// Group that every authenticated user belongs to.
pub const AUTHENTICATED: &str = "system:authenticated";

/// Group that every user authenticated through the OAuth server belongs to.
pub const AUTHENTICATED_OAUTH: &str = "system:authenticated:oauth";

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

/// The actor on whose behalf API requests are issued.
///
/// An empty principal denotes the ambient credential, i.e. no impersonation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    principal: String,
    groups: Vec<String>,
}

/// A fully-qualified service account, `system:serviceaccount:<ns>:<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceAccount {
    pub namespace: String,
    pub name: String,
}

/// Produces [`Resources`] clients bound to a fixed identity.
///
/// Implementations must return independent clients: the identity of one
/// client must never be observable through another, even when both are used
/// concurrently.
pub trait Impersonate {
    type Client: Resources;

    fn client_for(&self, identity: Identity) -> Result<Self::Client, Error>;

    /// A client that uses the ambient credential.
    fn ambient(&self) -> Result<Self::Client, Error> {
        self.client_for(Identity::ambient())
    }

    fn for_user<I, S>(&self, principal: &str, extra_groups: I) -> Result<Self::Client, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_for(Identity::user(principal, extra_groups))
    }

    fn for_service_account(&self, qualified_name: &str) -> Result<Self::Client, Error> {
        let sa = qualified_name.parse::<ServiceAccount>()?;
        self.client_for(Identity::service_account(&sa))
    }

    /// A client acting as a member of the `dedicated-admins` group.
    fn as_dedicated_admin(&self) -> Result<Self::Client, Error> {
        self.for_user("test-user@redhat.com", ["dedicated-admins"])
    }
}

/// Builds kube-backed clients that impersonate a given identity.
///
/// Each client is built from a private copy of the base configuration, so the
/// impersonation headers are carried only by the requests of that client.
#[derive(Clone)]
pub struct IdentityFactory {
    config: kube::Config,
}

// === impl Identity ===

impl Identity {
    pub fn ambient() -> Self {
        Self::default()
    }

    /// Impersonates `principal` as a member of `extra_groups` and of the
    /// baseline authenticated groups.
    ///
    /// Groups keep the order of their first appearance; duplicates are
    /// dropped. An empty principal yields the ambient identity.
    pub fn user<I, S>(principal: impl Into<String>, extra_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let principal = principal.into();
        if principal.is_empty() {
            return Self::ambient();
        }

        let mut groups = Vec::<String>::new();
        let baseline = [AUTHENTICATED, AUTHENTICATED_OAUTH].map(String::from);
        for group in extra_groups.into_iter().map(Into::<String>::into).chain(baseline) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        Self { principal, groups }
    }

    pub fn service_account(sa: &ServiceAccount) -> Self {
        Self::user(sa.to_string(), std::iter::empty::<String>())
    }

    #[inline]
    pub fn is_ambient(&self) -> bool {
        self.principal.is_empty()
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ambient() {
            return f.write_str("<ambient>");
        }
        write!(f, "{} [{}]", self.principal, self.groups.join(", "))
    }
}

// === impl ServiceAccount ===

impl FromStr for ServiceAccount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidIdentity(s.to_string());
        let rest = s.strip_prefix(SERVICE_ACCOUNT_PREFIX).ok_or_else(invalid)?;
        let (namespace, name) = rest.split_once(':').ok_or_else(invalid)?;
        if namespace.is_empty() || name.is_empty() || name.contains(':') {
            return Err(invalid());
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", SERVICE_ACCOUNT_PREFIX, self.namespace, self.name)
    }
}

// === impl IdentityFactory ===

impl IdentityFactory {
    pub fn new(config: kube::Config) -> Self {
        Self { config }
    }

    /// Uses the in-cluster configuration or the local kubeconfig.
    pub async fn infer() -> Result<Self, Error> {
        let config = kube::Config::infer().await?;
        Ok(Self::new(config))
    }

    /// Uses the named context from the local kubeconfig, or its current
    /// context when none is given.
    pub async fn from_kubeconfig(context: Option<String>) -> Result<Self, Error> {
        let options = kube::config::KubeConfigOptions {
            context,
            ..Default::default()
        };
        let config = kube::Config::from_kubeconfig(&options).await?;
        Ok(Self::new(config))
    }

    /// Returns the configuration a client for `identity` is built from.
    ///
    /// Ambient clients never impersonate, even when the kubeconfig itself
    /// names a user to act as.
    pub fn config_for(&self, identity: &Identity) -> kube::Config {
        let mut config = self.config.clone();
        if identity.is_ambient() {
            config.auth_info.impersonate = None;
            config.auth_info.impersonate_groups = None;
        } else {
            config.auth_info.impersonate = Some(identity.principal.clone());
            config.auth_info.impersonate_groups = Some(identity.groups.clone());
        }
        config
    }
}

impl Impersonate for IdentityFactory {
    type Client = ResourceClient;

    fn client_for(&self, identity: Identity) -> Result<ResourceClient, Error> {
        let config = self.config_for(&identity);
        let client = kube::Client::try_from(config).map_err(|source| Error::Client {
            principal: identity.principal.clone(),
            source,
        })?;
        tracing::debug!(%identity, "Built client");
        Ok(ResourceClient::new(client, identity))
    }
}

impl fmt::Debug for IdentityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityFactory")
            .field("cluster_url", &self.config.cluster_url)
            .finish_non_exhaustive()
    }
}
