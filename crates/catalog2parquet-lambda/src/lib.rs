// AWS Lambda runtime adapter
//
// Handles events that trigger the ETL function. The handler is built once from
// `LambdaConfig` and shared read-only across invocations.

use catalog2parquet_config::LambdaConfig;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

mod response;

pub use response::{InvocationResult, SUCCESS_MESSAGE};

/// Build metadata injected by build.rs
const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("GIT_HASH");

/// Handler for ETL trigger events
#[derive(Debug, Clone)]
pub struct EtlHandler {
    config: LambdaConfig,
}

impl EtlHandler {
    pub fn new(config: LambdaConfig) -> Self {
        Self { config }
    }

    pub fn data_bucket(&self) -> &str {
        &self.config.data_bucket
    }

    /// Process one event. The payload is not inspected.
    pub fn invoke(&self, _event: &Value) -> InvocationResult {
        tracing::info!("ETL job started, data bucket is {}", self.config.data_bucket);
        InvocationResult::success()
    }

    pub async fn handle(&self, event: LambdaEvent<Value>) -> Result<InvocationResult, Error> {
        let (payload, _context) = event.into_parts();
        Ok(self.invoke(&payload))
    }
}

/// JSON logs without timestamps; CloudWatch stamps every line itself
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if a subscriber is already set
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().without_time())
        .try_init();
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    init_tracing();
    tracing::info!(
        version = VERSION,
        git_hash = GIT_HASH,
        "Starting catalog2parquet Lambda handler"
    );

    // No invocation is served without a bucket
    let config = LambdaConfig::from_env()?;
    tracing::debug!("Data bucket: {}", config.data_bucket);

    let handler = Arc::new(EtlHandler::new(config));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move { handler.handle(event).await }
    }))
    .await
}
