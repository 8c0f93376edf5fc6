use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use semver::Version;

use graphql_dispatch::graphql_client::{
    context::RequestContext,
    credentials::AnonymousAuthenticator,
    dispatcher::GraphQLDispatcher,
    endpoint::ApiEndpoint,
    error::{ClientError, cancelled, transport_error},
    registry::RateLimitRegistry,
    types::{RateBudgetConfig, default_public_hosts},
    version::{ALL_MATCHING_VERSION, VersionCache, supports},
};

use crate::support::{ScriptedTransport, ok_json, response};

const RESET_INTERVAL: Duration = Duration::from_secs(6 * 60);

fn enterprise(host: &str) -> ApiEndpoint {
    ApiEndpoint::parse(&format!("https://{}/api/v3", host), &default_public_hosts())
        .expect("endpoint should parse")
}

async fn counted_fetch(
    calls: &AtomicUsize,
    result: Result<Version, ClientError>,
) -> Result<Version, ClientError> {
    calls.fetch_add(1, Ordering::SeqCst);
    result
}

#[tokio::test(start_paused = true)]
async fn given_cached_version_when_requested_within_window_then_fetched_once() {
    let cache = VersionCache::new(RESET_INTERVAL);
    let endpoint = enterprise("ghe.example.com");
    let calls = AtomicUsize::new(0);

    let first = cache
        .get_or_fetch(&endpoint, || counted_fetch(&calls, Ok(Version::new(3, 1, 0))))
        .await;
    tokio::time::advance(Duration::from_secs(60)).await;
    let second = cache
        .get_or_fetch(&endpoint, || counted_fetch(&calls, Ok(Version::new(9, 9, 9))))
        .await;

    assert_eq!(first, Version::new(3, 1, 0));
    assert_eq!(second, first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn given_reset_interval_elapsed_when_requested_then_whole_cache_is_cleared() {
    let cache = VersionCache::new(RESET_INTERVAL);
    let first_host = enterprise("ghe-a.example.com");
    let second_host = enterprise("ghe-b.example.com");
    let calls = AtomicUsize::new(0);

    cache
        .get_or_fetch(&first_host, || counted_fetch(&calls, Ok(Version::new(2, 22, 0))))
        .await;
    cache
        .get_or_fetch(&second_host, || counted_fetch(&calls, Ok(Version::new(3, 0, 0))))
        .await;
    assert_eq!(cache.cached_entries().await, 2);

    tokio::time::advance(RESET_INTERVAL + Duration::from_secs(1)).await;
    let refreshed = cache
        .get_or_fetch(&first_host, || counted_fetch(&calls, Ok(Version::new(3, 1, 0))))
        .await;

    assert_eq!(refreshed, Version::new(3, 1, 0));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.cached_entries().await, 1);
}

#[tokio::test]
async fn given_public_endpoint_when_requested_then_all_matching_without_fetch() {
    let cache = VersionCache::new(RESET_INTERVAL);
    let calls = AtomicUsize::new(0);

    let version = cache
        .get_or_fetch(&ApiEndpoint::public(), || {
            counted_fetch(&calls, Ok(Version::new(1, 0, 0)))
        })
        .await;

    assert_eq!(version, ALL_MATCHING_VERSION);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(supports(&version, ">= 3.0.0").expect("requirement"));
}

#[tokio::test]
async fn given_fetch_failure_when_requested_then_fallback_is_cached() {
    let cache = VersionCache::new(RESET_INTERVAL);
    let endpoint = enterprise("ghe.example.com");
    let calls = AtomicUsize::new(0);

    let first = cache
        .get_or_fetch(&endpoint, || {
            counted_fetch(&calls, Err(transport_error("connection refused")))
        })
        .await;
    let second = cache
        .get_or_fetch(&endpoint, || counted_fetch(&calls, Ok(Version::new(3, 1, 0))))
        .await;

    assert_eq!(first, ALL_MATCHING_VERSION);
    assert_eq!(second, ALL_MATCHING_VERSION);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_cancelled_fetch_when_requested_then_next_caller_fetches_again() {
    let cache = VersionCache::new(RESET_INTERVAL);
    let endpoint = enterprise("ghe.example.com");
    let calls = AtomicUsize::new(0);

    let first = cache
        .get_or_fetch(&endpoint, || {
            counted_fetch(&calls, Err(cancelled("request cancelled")))
        })
        .await;
    let second = cache
        .get_or_fetch(&endpoint, || counted_fetch(&calls, Ok(Version::new(3, 1, 0))))
        .await;

    assert_eq!(first, ALL_MATCHING_VERSION);
    assert_eq!(second, Version::new(3, 1, 0));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn given_concurrent_lookups_when_cache_is_cold_then_one_fetch_serves_all() {
    let cache = Arc::new(VersionCache::new(RESET_INTERVAL));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let cache = cache.clone();
        let calls = calls.clone();
        tasks.push(tokio::spawn(async move {
            cache
                .get_or_fetch(&enterprise("ghe.example.com"), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Version::new(3, 2, 1))
                })
                .await
        }));
    }

    for task in tasks {
        assert_eq!(task.await.expect("lookup task"), Version::new(3, 2, 1));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_self_hosted_dispatcher_when_server_version_then_meta_endpoint_is_used_once() {
    let transport = Arc::new(ScriptedTransport::new(vec![ok_json(
        r#"{"installed_version": "3.1", "verifiable_password_authentication": true}"#,
    )]));
    let dispatcher = GraphQLDispatcher::new(
        enterprise("ghe.example.com"),
        Arc::new(AnonymousAuthenticator),
        transport.clone(),
        Arc::new(RateLimitRegistry::new(RateBudgetConfig::default())),
        Arc::new(VersionCache::new(RESET_INTERVAL)),
    );
    let ctx = RequestContext::new();

    assert_eq!(dispatcher.server_version(&ctx).await, Version::new(3, 1, 0));
    assert_eq!(dispatcher.server_version(&ctx).await, Version::new(3, 1, 0));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, reqwest::Method::GET);
    assert_eq!(
        requests[0].url.as_str(),
        "https://ghe.example.com/api/v3/meta"
    );
}

#[tokio::test]
async fn given_meta_endpoint_error_when_server_version_then_permissive_fallback() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(response(
        404,
        r#"{"message": "Not Found"}"#,
        &[],
    ))]));
    let dispatcher = GraphQLDispatcher::new(
        enterprise("ghe.example.com"),
        Arc::new(AnonymousAuthenticator),
        transport,
        Arc::new(RateLimitRegistry::new(RateBudgetConfig::default())),
        Arc::new(VersionCache::new(RESET_INTERVAL)),
    );

    let version = dispatcher.server_version(&RequestContext::new()).await;
    assert_eq!(version, ALL_MATCHING_VERSION);
}
