use std::collections::HashMap;
use std::sync::Arc;

use config::Environment;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

use crate::bail;
use crate::connection::Connection;
use crate::error::{ErrorKind, MartechError, MartechResult};
use crate::secrets::SecretsStore;

/// Name of the secrets bundle used in production.
pub const PROD_SECRET_NAME: &str = "martech";

/// Name of the secrets bundle used outside production.
pub const DEV_SECRET_NAME: &str = "martech_dev";

/// Returns the bundle name to use in `environment`.
pub fn default_secret_name(environment: Environment) -> &'static str {
    if environment.is_prod() {
        PROD_SECRET_NAME
    } else {
        DEV_SECRET_NAME
    }
}

/// Raw secrets bundle: connection id to its unparsed entry.
///
/// Entries are parsed on lookup, so that unrelated secrets stored next to the connections never
/// prevent resolving them.
type SecretBundle = Map<String, Value>;

/// Process-wide cache of secrets bundles, keyed by secret name.
///
/// Clones share the same cache. Concurrent first lookups of a name wait on a single fetch.
/// Failed fetches are not cached.
#[derive(Debug, Clone, Default)]
pub struct SecretBundleCache {
    bundles: Arc<RwLock<HashMap<String, Arc<OnceCell<Arc<SecretBundle>>>>>>,
}

impl SecretBundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bundle stored under `secret_name`, fetching it from `store` on first use.
    pub async fn get_or_fetch(
        &self,
        secret_name: &str,
        store: &dyn SecretsStore,
    ) -> MartechResult<Arc<SecretBundle>> {
        let cell = self.cell(secret_name).await;

        cell.get_or_try_init(|| async {
            let bundle = fetch_bundle(store, secret_name).await?;
            Ok::<_, MartechError>(Arc::new(bundle))
        })
        .await
        .cloned()
    }

    /// Returns the number of bundles fetched so far.
    pub async fn len(&self) -> usize {
        let bundles = self.bundles.read().await;
        bundles.values().filter(|cell| cell.initialized()).count()
    }

    /// Returns `true` when no bundle has been fetched yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn cell(&self, secret_name: &str) -> Arc<OnceCell<Arc<SecretBundle>>> {
        // Fast path: the cell already exists.
        {
            let bundles = self.bundles.read().await;
            if let Some(cell) = bundles.get(secret_name) {
                return cell.clone();
            }
        }

        let mut bundles = self.bundles.write().await;
        bundles
            .entry(secret_name.to_owned())
            .or_default()
            .clone()
    }
}

async fn fetch_bundle(store: &dyn SecretsStore, secret_name: &str) -> MartechResult<SecretBundle> {
    info!(secret_name, "loading connection secrets bundle");

    let payload = store.get_secret(secret_name).await?;
    let bundle: Value = serde_json::from_str(payload.expose_secret())?;

    let Value::Object(entries) = bundle else {
        bail!(
            ErrorKind::DeserializationError,
            "Secrets bundle is not a JSON object",
            secret_name
        );
    };

    debug!(
        secret_name,
        entries = entries.len(),
        "loaded connection secrets bundle"
    );

    Ok(entries)
}

/// Resolves connection ids into [`Connection`] values from a secrets bundle.
///
/// The bundle is fetched once per secret name and shared through the [`SecretBundleCache`].
#[derive(Clone)]
pub struct ConnectionResolver {
    store: Arc<dyn SecretsStore>,
    secret_name: String,
    cache: SecretBundleCache,
}

impl ConnectionResolver {
    /// Creates a resolver reading `secret_name` from `store`.
    pub fn new(
        store: Arc<dyn SecretsStore>,
        secret_name: impl Into<String>,
        cache: SecretBundleCache,
    ) -> Self {
        Self {
            store,
            secret_name: secret_name.into(),
            cache,
        }
    }

    /// Returns the name of the secrets bundle this resolver reads.
    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    /// Returns the connection registered under `connection_id`.
    pub async fn resolve(&self, connection_id: &str) -> MartechResult<Connection> {
        let bundle = self
            .cache
            .get_or_fetch(&self.secret_name, self.store.as_ref())
            .await?;

        match bundle.get(connection_id) {
            Some(entry) => Connection::from_bundle_entry(connection_id, entry.clone()),
            None => bail!(
                ErrorKind::ConnectionNotFound,
                "Connection not found in secrets bundle",
                format!("{connection_id} in {}", self.secret_name)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::secrets::CountingSecretsStore;

    fn bundle() -> String {
        json!({
            "clevertap_default": {
                "host": "api.clevertap.com",
                "login": "ACC-1",
                "password": "pass"
            },
            "gamooga_default": {
                "login": "company",
                "password": "secret",
                "extra": {"company_id": "c-1"}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn resolves_connections_with_a_single_fetch() {
        let store = CountingSecretsStore::new();
        store.insert("martech_dev", bundle()).await;
        let resolver =
            ConnectionResolver::new(Arc::new(store.clone()), "martech_dev", SecretBundleCache::new());

        let clevertap = resolver.resolve("clevertap_default").await.unwrap();
        let gamooga = resolver.resolve("gamooga_default").await.unwrap();

        assert_eq!(clevertap.login.as_deref(), Some("ACC-1"));
        assert_eq!(gamooga.extra_str("company_id"), Some("c-1"));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_lookups_share_one_fetch() {
        let store = CountingSecretsStore::new();
        store.insert("martech_dev", bundle()).await;
        let cache = SecretBundleCache::new();
        let resolver = ConnectionResolver::new(Arc::new(store.clone()), "martech_dev", cache.clone());

        let (a, b) = tokio::join!(
            resolver.resolve("clevertap_default"),
            resolver.resolve("gamooga_default")
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(store.calls(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_connection_is_reported() {
        let store = CountingSecretsStore::new();
        store.insert("martech_dev", bundle()).await;
        let resolver =
            ConnectionResolver::new(Arc::new(store), "martech_dev", SecretBundleCache::new());

        let err = resolver.resolve("netcore_default").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionNotFound);
    }

    #[tokio::test]
    async fn failed_fetches_are_retried_on_next_lookup() {
        let store = CountingSecretsStore::new();
        let cache = SecretBundleCache::new();
        let resolver = ConnectionResolver::new(Arc::new(store.clone()), "martech", cache.clone());

        let err = resolver.resolve("clevertap_default").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecretNotFound);
        assert!(cache.is_empty().await);

        store.insert("martech", bundle()).await;
        assert!(resolver.resolve("clevertap_default").await.is_ok());
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn unrelated_secrets_do_not_break_lookups() {
        let store = CountingSecretsStore::new();
        store
            .insert(
                "martech_dev",
                json!({
                    "clevertap_default": {"host": "api.clevertap.com", "login": "ACC-1"},
                    "slack_webhook_token": "xoxb-123"
                })
                .to_string(),
            )
            .await;
        let resolver =
            ConnectionResolver::new(Arc::new(store), "martech_dev", SecretBundleCache::new());

        let clevertap = resolver.resolve("clevertap_default").await.unwrap();
        assert_eq!(clevertap.login.as_deref(), Some("ACC-1"));

        let err = resolver.resolve("slack_webhook_token").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn secret_name_depends_on_environment() {
        assert_eq!(default_secret_name(Environment::Prod), "martech");
        assert_eq!(default_secret_name(Environment::Dev), "martech_dev");
        assert_eq!(default_secret_name(Environment::Preprod), "martech_dev");
    }
}
