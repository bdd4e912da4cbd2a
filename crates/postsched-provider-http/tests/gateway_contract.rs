//! Contract Test: HTTP Gateway Provider
//!
//! Constraints verified against a mock gateway:
//! - Requests carry the bearer token and hit the documented endpoints
//! - Each trait call issues exactly one request, failures included
//! - Non-2xx statuses surface as provider errors

use futures::TryStreamExt;
use postsched_core::Error;
use postsched_core::traits::{
    FollowerListingProvider, PublishedMedia, PublishingProvider, follower_pages,
};
use postsched_provider_http::HttpGraphClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn upload_posts_base64_image_and_caption() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/acme/media"))
        .and(header("authorization", "Bearer acme-token"))
        .and(body_partial_json(json!({
            "image": "AAEC",
            "caption": "sunset #beach",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1789",
            "code": "Cx9",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "acme-token", "acme").unwrap();
    let media = client.upload_photo(&[0, 1, 2], "sunset #beach").await.unwrap();

    assert_eq!(media.id, "1789");
    assert_eq!(media.code.as_deref(), Some("Cx9"));
}

#[tokio::test]
async fn default_account_is_addressed_as_me() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/me/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "42" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "").unwrap();
    let media = client.upload_photo(b"img", "").await.unwrap();

    assert_eq!(media, PublishedMedia::new("42"));
}

#[tokio::test]
async fn server_error_is_a_single_retryable_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/accounts/me/media"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "").unwrap();
    let err = client.upload_photo(b"img", "").await.unwrap_err();

    assert!(matches!(err, Error::PublishProvider { .. }));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn unauthorized_upload_reports_authentication() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "stale", "acme").unwrap();
    let err = client.upload_photo(b"img", "").await.unwrap_err();

    assert!(err.to_string().contains("Authentication failed"));
}

#[tokio::test]
async fn set_location_targets_the_media() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/media/1789/location"))
        .and(body_partial_json(json!({ "location": "Lisbon" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "acme").unwrap();
    assert!(client.supports_location());
    client
        .set_location(&PublishedMedia::new("1789"), "Lisbon")
        .await
        .unwrap();
}

#[tokio::test]
async fn follower_count_is_read() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/acme/followers/count"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 1234 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "").unwrap();
    assert_eq!(client.total_count("acme").await.unwrap(), 1234);
}

#[tokio::test]
async fn follower_pages_follow_the_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/acme/followers"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": ["c"],
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Lower priority so the cursor-matched mock wins for the second page
    Mock::given(method("GET"))
        .and(path("/accounts/acme/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": ["a", "b"],
            "next_cursor": "p2",
        })))
        .with_priority(10)
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "").unwrap();
    let pages: Vec<_> = follower_pages(&client, "acme").try_collect().await.unwrap();

    let ids: Vec<String> = pages.into_iter().flatten().collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn listing_failure_is_a_listing_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/acme/followers"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "").unwrap();
    let err = client.list_page("acme", None).await.unwrap_err();

    assert!(matches!(err, Error::ListingProvider { .. }));
    assert!(err.to_string().contains("Rate limit"));
}

#[tokio::test]
async fn malformed_body_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/accounts/acme/followers/count"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpGraphClient::new(&server.uri(), "token", "").unwrap();
    let err = client.total_count("acme").await.unwrap_err();

    assert!(err.to_string().contains("Failed to parse"));
}
