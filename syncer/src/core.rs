use std::sync::Arc;

use config::Environment;
use config::shared::{BatchConfig, DestinationConfig, SourceConfig, SyncerConfig};
use martech::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use martech::connection::{ConnectionResolver, SecretBundleCache, default_secret_name};
use martech::delivery::{ReqwestTransport, RetryPolicy};
use martech::destination::{
    ClevertapDestination, DeliverySetup, Destination, GamoogaDestination, MemoryDestination,
    NetcoreDestination,
};
use martech::pipeline::SyncPipeline;
use martech::secrets::SecretsStore;
use martech::source::{RecordSource, open_source};
use martech::storage::ObjectStore;
use martech::transform::{RecordTransformer, TransformRegistry};
use martech::types::RunReport;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Runs the configured sync once and returns its report.
///
/// SIGTERM and SIGINT request a graceful stop: the batch in flight completes and the report
/// of what was delivered so far is returned, marked as cancelled.
pub async fn start_syncer_with_config(
    config: SyncerConfig,
    environment: Environment,
) -> anyhow::Result<RunReport> {
    info!(environment = %environment, "starting syncer");

    log_config(&config);

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let shutdown_handle = spawn_shutdown_listener(shutdown_tx);

    let result = run(&config, environment, shutdown_rx).await;

    // The listener is still waiting for a signal when the run finishes on its own.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result
}

async fn run(
    config: &SyncerConfig,
    environment: Environment,
    shutdown_rx: ShutdownRx,
) -> anyhow::Result<RunReport> {
    let secret_name = config
        .secrets
        .secret_name
        .clone()
        .unwrap_or_else(|| default_secret_name(environment).to_owned());
    let resolver = ConnectionResolver::new(
        init_secrets_store(&config.secrets.region).await,
        secret_name,
        SecretBundleCache::new(),
    );
    let store = init_object_store(&resolver, config).await?;

    let transport = Arc::new(ReqwestTransport::new(config.retry.request_timeout())?);
    let setup = DeliverySetup::new(transport, RetryPolicy::from_config(&config.retry))
        .with_shutdown(shutdown_rx.clone());
    let transformer =
        RecordTransformer::new(&config.transform, &TransformRegistry::with_builtins())?;
    let mut source = open_source(
        &config.source,
        store.clone(),
        config.batch.read_chunk_size,
    )
    .await?;

    // One arm per destination, each pipeline is statically dispatched on its adapter.
    match &config.destination {
        DestinationConfig::Memory => {
            let destination = MemoryDestination::new();
            run_pipeline(destination, transformer, config, shutdown_rx, source.as_mut()).await
        }
        DestinationConfig::Clevertap { event } => {
            let destination =
                ClevertapDestination::open(&resolver, &config.connection_id, event.clone(), &setup)
                    .await?;
            run_pipeline(destination, transformer, config, shutdown_rx, source.as_mut()).await
        }
        DestinationConfig::Netcore {
            staging_region,
            staging_prefix,
        } => {
            let destination = NetcoreDestination::open(
                &resolver,
                &config.connection_id,
                staging_region.clone(),
                staging_prefix.clone(),
                store,
                &setup,
            )
            .await?;
            run_pipeline(destination, transformer, config, shutdown_rx, source.as_mut()).await
        }
        DestinationConfig::Gamooga { property_types } => {
            let destination = GamoogaDestination::open(
                &resolver,
                &config.connection_id,
                property_types.clone(),
                &setup,
            )
            .await?;
            run_pipeline(destination, transformer, config, shutdown_rx, source.as_mut()).await
        }
    }
}

async fn run_pipeline<D>(
    destination: D,
    transformer: RecordTransformer,
    config: &SyncerConfig,
    shutdown_rx: ShutdownRx,
    source: &mut dyn RecordSource,
) -> anyhow::Result<RunReport>
where
    D: Destination + Send + Sync,
{
    let pipeline = SyncPipeline::new(
        destination,
        transformer,
        config.batch.clone(),
        config.failure_policy,
    )
    .with_shutdown(shutdown_rx);

    let result = pipeline.run(config.operation, source).await;

    // The destination is released whatever the outcome of the run.
    if let Err(err) = pipeline.destination().shutdown().await {
        warn!(error = %err, "failed to shut down the destination");
    }

    Ok(result?)
}

/// Listens for SIGTERM and SIGINT and turns the first one into a shutdown request.
fn spawn_shutdown_listener(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                warn!(error = %err, "failed to register the SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT (Ctrl+C) received, stopping the run");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, stopping the run");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
        }
    })
}

#[cfg(feature = "aws")]
async fn init_secrets_store(region: &str) -> Arc<dyn SecretsStore> {
    Arc::new(martech::secrets::AwsSecretsManagerStore::new(region).await)
}

#[cfg(not(feature = "aws"))]
async fn init_secrets_store(region: &str) -> Arc<dyn SecretsStore> {
    warn!(region, "built without aws support, no connection can be resolved");
    Arc::new(martech::secrets::MemorySecretsStore::new())
}

/// Connects to the object store when the run reads or stages files.
///
/// Credentials come from `aws_connection_id` when set, from the default credential chain
/// otherwise.
#[cfg(feature = "aws")]
async fn init_object_store(
    resolver: &ConnectionResolver,
    config: &SyncerConfig,
) -> anyhow::Result<Option<Arc<dyn ObjectStore>>> {
    use martech::storage::{S3ObjectStore, S3ObjectStoreConfig};

    if !needs_object_store(config) {
        return Ok(None);
    }

    let store_config = match &config.aws_connection_id {
        Some(connection_id) => {
            let connection = resolver.resolve(connection_id).await?;
            S3ObjectStoreConfig::from_connection(&connection, config.secrets.region.clone())
        }
        None => S3ObjectStoreConfig {
            region: config.secrets.region.clone(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
        },
    };

    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::connect(store_config).await);
    Ok(Some(store))
}

#[cfg(not(feature = "aws"))]
async fn init_object_store(
    _resolver: &ConnectionResolver,
    config: &SyncerConfig,
) -> anyhow::Result<Option<Arc<dyn ObjectStore>>> {
    if needs_object_store(config) {
        warn!("built without aws support, the run has no object store");
    }

    Ok(None)
}

fn needs_object_store(config: &SyncerConfig) -> bool {
    matches!(config.source, SourceConfig::ObjectStore { .. })
        || matches!(config.destination, DestinationConfig::Netcore { .. })
}

fn log_config(config: &SyncerConfig) {
    info!(
        destination = config.destination.name(),
        connection_id = %config.connection_id,
        operation = %config.operation,
        failure_policy = ?config.failure_policy,
        "loaded sync run config"
    );
    log_source_config(&config.source);
    log_batch_config(&config.batch);
}

fn log_source_config(config: &SourceConfig) {
    match config {
        SourceConfig::Inline { records } => {
            debug!(records = records.len(), "using inline source config");
        }
        SourceConfig::ObjectStore { bucket, key } => {
            debug!(bucket = %bucket, key = %key, "using object store source config");
        }
    }
}

fn log_batch_config(config: &BatchConfig) {
    debug!(
        max_payload_bytes = config.max_payload_bytes,
        max_records = config.max_records,
        strategy = ?config.strategy,
        read_chunk_size = config.read_chunk_size,
        "batch config"
    );
}
