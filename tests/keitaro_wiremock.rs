use chrono::NaiveDate;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adledger::config::TrackerConfig;
use adledger::errors::Error;
use adledger::tracker::providers::KeitaroClient;
use adledger::tracker::{ReportFilter, ReportQuery, TrackerReportSource};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn query(from: &str, to: &str) -> ReportQuery {
    ReportQuery {
        date_from: date(from),
        date_to: date(to),
        grouping: vec!["sub_id_6".to_string(), "day".to_string()],
        metrics: vec!["clicks".to_string(), "revenue".to_string()],
        filters: vec![ReportFilter::equals("offer_id", 5)],
    }
}

#[tokio::test]
async fn report_build_round_trip() {
    let server = MockServer::start().await;
    let client = KeitaroClient::new("unused.example.com", "secret").with_base_url(server.uri());

    let body = r#"{
        "rows": [
            {"day": "2024-01-01", "sub_id_6": "b1", "clicks": 14, "revenue": 200.5},
            {"day": "2024-01-01", "sub_id_6": null, "clicks": 3, "revenue": 0}
        ],
        "summary": {"clicks": 17, "revenue": 200.5, "note": "ignored"}
    }"#;

    Mock::given(method("POST"))
        .and(path("/report/build"))
        .and(header("Api-Key", "secret"))
        .and(body_partial_json(serde_json::json!({
            "range": {
                "interval": "custom_date_range",
                "from": "2024-01-01 0:00",
                "to": "2024-01-07 23:59"
            },
            "limit": 20000,
            "summary": true,
            "extended": true,
            "grouping": ["sub_id_6", "day"],
            "metrics": ["clicks", "revenue"],
            "filters": [{"name": "offer_id", "operator": "EQUALS", "expression": 5}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let report = client
        .fetch_report(&query("2024-01-01", "2024-01-07"))
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].number("clicks"), Some(14.0));
    assert_eq!(report.rows[0].number("revenue"), Some(200.5));
    // Null tracker cells are dropped, not turned into empty strings.
    assert!(!report.rows[1].contains("sub_id_6"));

    let summary = report.summary.unwrap();
    assert_eq!(summary.get("clicks"), Some(&17.0));
    // Non-numeric summary fields are not metrics.
    assert!(!summary.contains_key("note"));
}

#[tokio::test]
async fn empty_grouping_and_metrics_fall_back_to_defaults() {
    let server = MockServer::start().await;
    let client = KeitaroClient::new("unused.example.com", "secret").with_base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/report/build"))
        .and(body_partial_json(serde_json::json!({
            "grouping": ["sub_id_6", "day"],
            "metrics": [
                "clicks",
                "campaign_unique_clicks",
                "conversions",
                "revenue",
                "uepc_confirmed"
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"rows": []}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = client
        .fetch_report(&ReportQuery {
            date_from: date("2024-01-01"),
            date_to: date("2024-01-01"),
            grouping: Vec::new(),
            metrics: Vec::new(),
            filters: Vec::new(),
        })
        .await
        .unwrap();

    assert!(report.rows.is_empty());
    assert!(report.summary.is_none());
}

#[tokio::test]
async fn server_error_maps_to_upstream_unavailable() {
    let server = MockServer::start().await;
    let client = KeitaroClient::new("unused.example.com", "secret").with_base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/report/build"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client
        .fetch_report(&query("2024-01-01", "2024-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn unconfigured_tracker_is_upstream_unavailable() {
    let err = KeitaroClient::from_config(&TrackerConfig::default()).unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn list_offers_round_trip() {
    let server = MockServer::start().await;
    let client = KeitaroClient::new("unused.example.com", "secret").with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/offers"))
        .and(header("Api-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"id": 5, "name": "Sweeps"}, {"id": 7, "name": "Dating"}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let offers = client.list_offers().await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].id, 5);
    assert_eq!(offers[1].name, "Dating");
}
