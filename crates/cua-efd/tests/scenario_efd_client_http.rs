//! EFD HTTP client against a mock InfluxDB `/query` endpoint.
//!
//! GREEN when:
//! - Time-series queries hit `/query` with `db`, `epoch=ns` and the rendered
//!   InfluxQL, and decode rows through the curator into ingestion records.
//! - A point lookup with no series answers `None` (not an error).
//! - A non-2xx status and a statement-level `error` both surface as errors.

use chrono::{TimeZone, Utc};
use cua_efd::{EfdClient, EfdCurator, IngestionQuery, LfoaRecord};
use cua_reconcile::{ImageId, IngestionRecord, ScanWindow};
use httpmock::prelude::*;
use serde_json::json;

const OODS: &str = "lsst.sal.CCArchiver.logevent_imageInOODS";
const LFOA: &str = "lsst.sal.CCHeaderService.logevent_largeFileObjectAvailable";

fn curator(server: &MockServer) -> EfdCurator<EfdClient> {
    EfdCurator::new(
        EfdClient::new(server.base_url(), "efd"),
        OODS,
        LFOA,
    )
}

#[tokio::test]
async fn image_in_oods_window_query_decodes_rows() {
    let server = MockServer::start_async().await;
    let now = Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap();
    let window = ScanWindow::lookback(now, 60).unwrap();

    let expected_q = format!(
        "SELECT \"obsid\", \"raft\", \"sensor\", \"statusCode\" FROM \"{OODS}\" \
         WHERE time >= '2020-03-01T11:00:00.000Z' AND time <= '2020-03-01T12:00:00.000Z'"
    );
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("db", "efd")
                .query_param("epoch", "ns")
                .query_param("q", expected_q.as_str());
            then.status(200).json_body(json!({
                "results": [{
                    "statement_id": 0,
                    "series": [{
                        "name": OODS,
                        "columns": ["time", "obsid", "raft", "sensor", "statusCode"],
                        "values": [
                            [1583060000000000000i64, "img1", "00", "00", 0],
                            [1583060000000000001i64, "img1", "00", "01", 0]
                        ]
                    }]
                }]
            }));
        })
        .await;

    let rows = curator(&server).image_in_oods(&window).await.unwrap();
    mock.assert_async().await;
    assert_eq!(
        rows,
        vec![
            IngestionRecord::new("img1", "00", "00", 0),
            IngestionRecord::new("img1", "00", "01", 0),
        ]
    );
}

#[tokio::test]
async fn lfoa_lookup_found_and_missing() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("q", format!("SELECT \"id\", \"url\" FROM \"{LFOA}\" WHERE \"id\" = 'img1'"));
            then.status(200).json_body(json!({
                "results": [{"series": [{
                    "columns": ["time", "id", "url"],
                    "values": [[1, "img1", "http://lfa/img1.fits"]]
                }]}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("q", format!("SELECT \"id\", \"url\" FROM \"{LFOA}\" WHERE \"id\" = 'img2'"));
            then.status(200)
                .json_body(json!({"results": [{"statement_id": 0}]}));
        })
        .await;

    let c = curator(&server);
    assert_eq!(
        c.large_file_object_available(&ImageId::from("img1"))
            .await
            .unwrap(),
        Some(LfoaRecord {
            id: "img1".into(),
            url: "http://lfa/img1.fits".into()
        })
    );
    assert_eq!(
        c.large_file_object_available(&ImageId::from("img2"))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn http_error_status_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/query");
            then.status(401)
                .json_body(json!({"error": "authorization failed"}));
        })
        .await;

    let client = EfdClient::new(server.base_url(), "efd");
    let err = client
        .point_query("t", &["*"], "id", "img1")
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("status=401"), "got: {chain}");
    assert!(chain.contains("authorization failed"), "got: {chain}");
}

#[tokio::test]
async fn statement_error_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/query");
            then.status(200).json_body(json!({
                "results": [{"statement_id": 0, "error": "error parsing query"}]
            }));
        })
        .await;

    let c = curator(&server);
    let err = c
        .large_file_object_available(&ImageId::from("img1"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("error parsing query"));
}
