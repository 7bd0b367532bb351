use audit_anchor::audit::{AnchorFilter, AnchorStatus};
use audit_anchor::AnchorError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::*;

fn anchor_response(id: u64, status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "anchor": anchor_json(id, status) }))
}

fn page(
    anchors: Vec<serde_json::Value>,
    page: u32,
    total_pages: u32,
    total: u64,
) -> serde_json::Value {
    json!({
        "anchors": anchors,
        "pagination": {
            "page": page,
            "per_page": 2,
            "total": total,
            "total_pages": total_pages
        }
    })
}

#[tokio::test]
async fn test_list_anchors_passes_filters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors"))
        .and(query_param("status", "confirmed"))
        .and(query_param("network", "polygon_amoy"))
        .and(query_param("limit", "100"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![anchor_json(42, "confirmed"), anchor_json(41, "confirmed")],
            1,
            1,
            2,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let filter = AnchorFilter::new()
        .with_status(AnchorStatus::Confirmed)
        .with_network("polygon_amoy")
        .with_limit(1_000);

    let result = client.list_anchors(&filter, 1).await.unwrap();
    assert_eq!(result.anchors.len(), 2);
    // Service order is preserved.
    assert_eq!(result.anchors[0].id, "42");
    assert_eq!(result.anchors[1].id, "41");
    assert!(result.anchors.iter().all(|a| a.tx_hash.is_some()));
    assert!(!result.pagination.has_next());
}

#[tokio::test]
async fn test_list_all_anchors_walks_pages_in_order() {
    let mock_server = MockServer::start().await;

    for (number, ids) in [(1u32, [6u64, 5]), (2, [4, 3]), (3, [2, 1])] {
        Mock::given(method("GET"))
            .and(path("/api/v1/audit/anchors"))
            .and(query_param("page", number.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(
                ids.iter().map(|id| anchor_json(*id, "submitted")).collect(),
                number,
                3,
                6,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = client_for(&mock_server);
    let anchors = client
        .list_all_anchors(&AnchorFilter::new().with_limit(2))
        .await
        .unwrap();

    let ids: Vec<&str> = anchors.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["6", "5", "4", "3", "2", "1"]);
}

#[tokio::test]
async fn test_list_all_anchors_stops_when_page_is_ignored() {
    let mock_server = MockServer::start().await;

    // Service answers every request with its first page.
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![anchor_json(2, "confirmed"), anchor_json(1, "confirmed")],
            1,
            2,
            4,
        )))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.list_all_anchors(&AnchorFilter::new().with_limit(2)),
    )
    .await
    .expect("paging did not terminate")
    .unwrap_err();

    assert!(matches!(err, AnchorError::RemoteResponse { .. }));
}

#[tokio::test]
async fn test_list_all_anchors_stops_at_empty_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![anchor_json(9, "confirmed"), anchor_json(8, "confirmed")],
            1,
            5,
            10,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], 2, 5, 10)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], 3, 5, 10)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let anchors = client
        .list_all_anchors(&AnchorFilter::new().with_limit(2))
        .await
        .unwrap();
    assert_eq!(anchors.len(), 2);
}

#[tokio::test]
async fn test_unknown_status_is_surfaced() {
    let mock_server = MockServer::start().await;
    let mut anchor = anchor_json(7, "confirmed");
    anchor["status"] = json!("finalized");

    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![anchor], 1, 1, 1)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .list_anchors(&AnchorFilter::new(), 1)
        .await
        .unwrap_err();

    match err {
        AnchorError::UnknownStatus(status) => assert_eq!(status, "finalized"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_get_anchor_with_string_id() {
    let mock_server = MockServer::start().await;
    let mut anchor = anchor_json(9, "pending");
    anchor["id"] = json!("anc_9f2c");

    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors/anc_9f2c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "anchor": anchor })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let anchor = client.get_anchor("anc_9f2c").await.unwrap();
    assert_eq!(anchor.id, "anc_9f2c");
    assert_eq!(anchor.status, AnchorStatus::Pending);
    assert!(anchor.tx_hash.is_none());
    assert!(anchor.explorer_url.is_none());
}

#[tokio::test]
async fn test_get_missing_anchor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not found"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get_anchor("404").await.unwrap_err();
    assert!(matches!(err, AnchorError::RemoteRejected { status: 404, .. }));
}

#[tokio::test]
async fn test_watch_anchor_until_confirmed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors/12"))
        .respond_with(anchor_response(12, "submitted"))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors/12"))
        .respond_with(anchor_response(12, "confirmed"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let anchor = client
        .watch_anchor("12", Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(anchor.status, AnchorStatus::Confirmed);
}

#[tokio::test]
async fn test_watch_anchor_rejects_regression() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors/13"))
        .respond_with(anchor_response(13, "submitted"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/audit/anchors/13"))
        .respond_with(anchor_response(13, "pending"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .watch_anchor("13", Duration::from_millis(10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnchorError::IllegalTransition {
            from: AnchorStatus::Submitted,
            to: AnchorStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_watch_anchor_rejects_zero_interval() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(anchor_response(14, "confirmed"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .watch_anchor("14", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, AnchorError::Config(_)));
}
