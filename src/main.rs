use std::sync::Arc;

use anyhow::{Context, anyhow};
use graphql_dispatch::{
    cli::args_from_env,
    config::Config,
    graphql_client::{
        context::RequestContext, dispatcher::GraphQLDispatcher, metrics::request_counter,
        registry::RateLimitRegistry, version::VersionCache,
    },
    logging::init_tracing,
};
use serde_json::Map;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = args_from_env()?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;
    let _logging_guard = init_tracing(&config.logging)?;

    let query = tokio::fs::read_to_string(&args.query_path)
        .await
        .with_context(|| format!("failed to read {}", args.query_path.display()))?;

    let registry = Arc::new(RateLimitRegistry::new(config.client.budget.clone()));
    let versions = Arc::new(VersionCache::new(config.client.version_cache.reset_interval()));
    let dispatcher = GraphQLDispatcher::from_config(&config.client, registry, versions)?;

    let ctx = if args.background {
        RequestContext::background()
    } else {
        RequestContext::new()
    }
    .with_timeout(config.client.request_timeout());

    let version = dispatcher.server_version(&ctx).await;
    tracing::info!(
        target: "graphql_client",
        endpoint = %dispatcher.endpoint(),
        version = %version,
        "server_version_resolved"
    );

    let result = dispatcher.execute_raw(&ctx, &query, Map::new()).await;
    tracing::info!(
        target: "graphql_client",
        requests = ?request_counter().counts(),
        "request_counts"
    );
    let response = result?;
    if let Some(errors) = &response.errors {
        for error in &errors.errors {
            tracing::warn!(
                target: "graphql_client",
                request_id = %response.request_id,
                kind = ?error.kind,
                message = %error.message,
                "graphql_error_reported"
            );
        }
    }

    match response.data {
        Some(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        None => Err(match response.errors {
            Some(errors) => anyhow!(errors),
            None => anyhow!("response carried neither data nor errors"),
        }),
    }
}
