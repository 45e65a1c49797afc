//! End-to-end tests against a local HTTP server through the reqwest transport.

use integrations_amazon_advertising::auth::FORM_CONTENT_TYPE;
use integrations_amazon_advertising::codec;
use integrations_amazon_advertising::{AdvertisingClient, AdvertisingError, Artifact, EntityId};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/auth/o2/token";

fn client_for(server: &MockServer, max_retry: u32) -> AdvertisingClient {
    AdvertisingClient::builder()
        .client_id("amzn1.application-oa2-client.test")
        .client_secret("client-secret")
        .refresh_token("Atzr|refresh")
        .profile_id("1234")
        .base_url(server.uri())
        .token_url(format!("{}{TOKEN_PATH}", server.uri()))
        .max_retry(max_retry)
        .max_wait_time(Duration::from_millis(20))
        .poll_interval(Duration::from_millis(10))
        .build()
        .unwrap()
}

fn token_body(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "refresh_token": "Atzr|refresh",
        "token_type": "bearer",
        "expires_in": 3600
    })
}

async fn mount_token(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_init_sends_refresh_token_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", FORM_CONTENT_TYPE))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("client_id=amzn1.application-oa2-client.test"))
        .and(body_string_contains("refresh_token=Atzr%7Crefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|first")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    client.init().await.unwrap();

    let token = client.tokens().access_token().await.unwrap();
    assert_eq!(token.secret(), "Atza|first");
    client.shutdown().await;
}

#[tokio::test]
async fn test_rejected_refresh_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The request has an invalid grant parameter : refresh_token"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let err = client.init().await.unwrap_err();

    assert!(err.is_auth());
    assert!(err.to_string().contains("invalid grant parameter"));
    assert!(!client.is_refreshing().await);
}

#[tokio::test]
async fn test_unauthorized_triggers_refresh_and_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|first")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("Atza|second")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sp/profiles"))
        .and(header("authorization", "Bearer Atza|first"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "UNAUTHORIZED",
            "details": "Not authorized to access this advertiser"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sp/profiles"))
        .and(header("authorization", "Bearer Atza|second"))
        .and(header("Amazon-Advertising-API-Scope", "1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"profileId": 1234}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    client.init().await.unwrap();

    let profiles = client.list_profiles().await.unwrap();

    assert_eq!(profiles, json!([{"profileId": 1234}]));
    assert_eq!(client.tokens().refresh_count(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn test_fatal_status_reports_details() {
    let server = MockServer::start().await;
    mount_token(&server, "Atza|first").await;
    Mock::given(method("PUT"))
        .and(path("/v2/sp/campaigns"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": "422",
            "details": "Campaign state is invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let err = client
        .invoke(
            "update_campaigns",
            &[],
            None,
            Some(&json!([{"campaignId": 1, "state": "sleeping"}])),
        )
        .await
        .unwrap_err();

    match err {
        AdvertisingError::Http { status, details, .. } => {
            assert_eq!(status, 422);
            assert_eq!(details.as_deref(), Some("Campaign state is invalid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    mount_token(&server, "Atza|first").await;
    Mock::given(method("GET"))
        .and(path("/v2/sp/campaigns/42"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let err = client
        .invoke("get_campaign", &[("campaignId", "42")], None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AdvertisingError::RetryExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_gzip_response_matches_plain_response() {
    let server = MockServer::start().await;
    mount_token(&server, "Atza|first").await;
    let body = r#"[{"campaignId":9007199254740993,"name":"Brand","state":"enabled"}]"#;
    Mock::given(method("GET"))
        .and(path("/v2/sp/campaigns"))
        .and(query_param("stateFilter", "enabled"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(codec::gzip(body.as_bytes()).unwrap()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sp/campaigns/extended"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let compressed = client
        .invoke("list_campaigns", &[], Some(&json!({"stateFilter": "enabled"})), None)
        .await
        .unwrap();
    let plain = client
        .invoke("list_campaigns_ex", &[], None, None)
        .await
        .unwrap();

    assert_eq!(compressed, plain);
    assert_eq!(compressed[0]["campaignId"].as_u64(), Some(9_007_199_254_740_993));
}

#[tokio::test]
async fn test_large_ids_are_sent_as_exact_numbers() {
    let server = MockServer::start().await;
    mount_token(&server, "Atza|first").await;
    Mock::given(method("POST"))
        .and(path("/v2/sp/keywords"))
        .and(body_string_contains(r#""keywordId":9007199254740993"#))
        .and(body_string_contains(r#""adGroupId":123"#))
        .respond_with(
            ResponseTemplate::new(207)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"[{"code":"SUCCESS","keywordId":9007199254740993}]"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let result = client
        .invoke(
            "create_biddable_keywords",
            &[],
            None,
            Some(&json!([{
                "keywordId": "9007199254740993",
                "adGroupId": "123",
                "keywordText": "running shoes",
                "matchType": "exact"
            }])),
        )
        .await
        .unwrap();

    let id: EntityId = serde_json::from_value(result[0]["keywordId"].clone()).unwrap();
    assert_eq!(id, EntityId(9_007_199_254_740_993));
}

#[tokio::test]
async fn test_report_end_to_end_with_redirect() {
    let server = MockServer::start().await;
    mount_token(&server, "Atza|first").await;

    Mock::given(method("POST"))
        .and(path("/v2/sp/keywords/report"))
        .and(body_string_contains("reportDate"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "reportId": "amzn1.clicksAPI.v1.p1.5F3A",
            "recordType": "keyword",
            "status": "IN_PROGRESS",
            "statusDetails": "Report is being generated"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/reports/amzn1.clicksAPI.v1.p1.5F3A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reportId": "amzn1.clicksAPI.v1.p1.5F3A",
            "status": "IN_PROGRESS"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/reports/amzn1.clicksAPI.v1.p1.5F3A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reportId": "amzn1.clicksAPI.v1.p1.5F3A",
            "status": "SUCCESS",
            "location": format!("{}/v2/reports/amzn1.clicksAPI.v1.p1.5F3A/download", server.uri()),
            "fileSize": 41
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/reports/amzn1.clicksAPI.v1.p1.5F3A/download"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("location", format!("{}/storage/report-1.json.gz", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/report-1.json.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(
                    codec::gzip(br#"[{"keywordId":9007199254740993,"clicks":4}]"#).unwrap(),
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    client.init().await.unwrap();

    let handle = client
        .request_report(
            "sp",
            "keywords",
            &json!({"reportDate": "20240101", "metrics": "impressions,clicks"}),
        )
        .await
        .unwrap();
    assert_eq!(handle.id, "amzn1.clicksAPI.v1.p1.5F3A");

    let artifact = client.jobs().await_result(&handle).await.unwrap();
    assert_eq!(
        artifact,
        Artifact::Json(serde_json::from_str(r#"[{"keywordId":9007199254740993,"clicks":4}]"#).unwrap())
    );
    assert_eq!(artifact.record_count(), Some(1));

    let requests = server.received_requests().await.unwrap();
    let download = requests
        .iter()
        .find(|r| r.url.path().ends_with("/download"))
        .unwrap();
    assert_eq!(
        download.headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer Atza|first")
    );
    let storage = requests
        .iter()
        .find(|r| r.url.path() == "/storage/report-1.json.gz")
        .unwrap();
    assert!(storage.headers.get("authorization").is_none());
    assert_eq!(
        storage
            .headers
            .get("amazon-advertising-api-scope")
            .and_then(|v| v.to_str().ok()),
        Some("1234")
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_failure_stops_polling() {
    let server = MockServer::start().await;
    mount_token(&server, "Atza|first").await;
    Mock::given(method("POST"))
        .and(path("/v2/sp/campaigns/snapshot"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "snapshotId": "amzn1.snap.9",
            "status": "IN_PROGRESS"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sp/snapshots/amzn1.snap.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "snapshotId": "amzn1.snap.9",
            "status": "FAILURE",
            "statusDetails": "Snapshot could not be generated"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let handle = client
        .request_snapshot("sp", "campaigns", &json!({"stateFilter": "enabled"}))
        .await
        .unwrap();
    let err = client
        .get_snapshot("sp", &handle.id)
        .await
        .unwrap_err();

    match err {
        AdvertisingError::JobFailed { job_id, details, .. } => {
            assert_eq!(job_id, "amzn1.snap.9");
            assert_eq!(details.as_deref(), Some("Snapshot could not be generated"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
