use content_indexer_common::{Document, FieldValue, ResolvedValue, SinkConfig};
use content_indexer_storage::{IndexSink, SinkError, SolrSink};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sink_for(server: &MockServer) -> SolrSink {
    let config = SinkConfig {
        url: format!("{}/solr/core/", server.uri()),
        timeout_secs: 5,
        dispatch_capacity: 2,
    };
    SolrSink::new(&config).expect("valid sink configuration")
}

fn document(id: &str) -> Document {
    let mut document = Document::new();
    document.add_field("id", ResolvedValue::Single(FieldValue::String(id.to_string())));
    document
}

fn ok_update() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"responseHeader": {"status": 0, "QTime": 1}}))
}

#[tokio::test]
async fn test_ping_reports_status_and_qtime() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solr/core/admin/ping"))
        .and(query_param("wt", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseHeader": {"status": 0, "QTime": 3},
            "status": "OK"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let ping = sink.ping().await.unwrap();

    assert_eq!(ping.status, "OK");
    assert_eq!(ping.qtime, Some(3));
}

#[tokio::test]
async fn test_ping_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solr/core/admin/ping"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    match sink.ping().await {
        Err(SinkError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "down");
        }
        other => panic!("expected a status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_query_all_reads_num_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solr/core/select"))
        .and(query_param("q", "*:*"))
        .and(query_param("rows", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseHeader": {"status": 0, "QTime": 0},
            "response": {"numFound": 12, "start": 0, "docs": [{"id": "a"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    let response = sink.query_all(1).await.unwrap();

    assert_eq!(response.num_found, 12);
    assert_eq!(response.documents, vec![json!({"id": "a"})]);
    assert!(!response.is_empty());
}

#[tokio::test]
async fn test_add_then_commit_posts_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/solr/core/update"))
        .and(body_json(json!([{"id": "a"}, {"id": "b"}])))
        .respond_with(ok_update())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/solr/core/update"))
        .and(body_json(json!({"commit": {}})))
        .respond_with(ok_update())
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    sink.add(vec![document("a"), document("b")]).await.unwrap();
    sink.commit().await.unwrap();

    assert!(!sink.error_flag().is_raised());

    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<serde_json::Value> = requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies, vec![json!([{"id": "a"}, {"id": "b"}]), json!({"commit": {}})]);
}

#[tokio::test]
async fn test_failed_dispatch_raises_the_error_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/solr/core/update"))
        .and(body_json(json!([{"id": "a"}])))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown field"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/solr/core/update"))
        .and(body_json(json!({"commit": {}})))
        .respond_with(ok_update())
        .mount(&server)
        .await;

    let sink = sink_for(&server);

    // Queued without waiting for the server
    sink.add(vec![document("a")]).await.unwrap();
    sink.commit().await.unwrap();

    assert!(sink.error_flag().is_raised());
}

#[tokio::test]
async fn test_delete_all_and_rollback_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/solr/core/update"))
        .and(body_json(json!({"delete": {"query": "*:*"}})))
        .respond_with(ok_update())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/solr/core/update"))
        .and(body_json(json!({"rollback": {}})))
        .respond_with(ok_update())
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    sink.delete_all().await.unwrap();
    sink.rollback().await.unwrap();
}

#[tokio::test]
async fn test_empty_add_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_update())
        .expect(0)
        .mount(&server)
        .await;

    let sink = sink_for(&server);
    sink.add(Vec::new()).await.unwrap();
}

#[tokio::test]
async fn test_rejects_invalid_url() {
    let config = SinkConfig {
        url: "::not a url".to_string(),
        ..SinkConfig::default()
    };
    assert!(matches!(SolrSink::new(&config), Err(SinkError::Url(_))));
}
