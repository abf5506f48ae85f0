//! HTTP range reads: 206 handling, servers ignoring `Range`, retries and a
//! GeoTIFF read back over HTTP.

mod common;

use std::time::Duration;

use ndarray::Array2;
use tokio_test::{assert_err, assert_ok};

use common::FakeServer;
use etl_common::Crs;
use raster::{encode_geotiff, CogReader, GeoTransform, HttpRangeSource, RangeSource, RasterError, TargetGrid};

fn source(server: &FakeServer) -> HttpRangeSource {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    HttpRangeSource::new(client, server.url()).with_retries(2, Duration::from_millis(1))
}

#[tokio::test]
async fn test_partial_content_returned() {
    let server = FakeServer::bind().await.respond(vec![(206, b"0123456789".to_vec())]);

    let bytes = assert_ok!(source(&server).read_range(100, 10).await);
    assert_eq!(&bytes[..], b"0123456789");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].header("range"), Some("bytes=100-109"));
}

#[tokio::test]
async fn test_full_response_rejected() {
    let server = FakeServer::bind().await.respond(vec![(200, b"whole file".to_vec())]);

    let err = assert_err!(source(&server).read_range(0, 4).await);
    assert!(matches!(err, RasterError::RangeNotSupported { .. }));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_missing_asset_not_retried() {
    let server = FakeServer::bind().await.respond(vec![(404, Vec::new())]);

    let err = assert_err!(source(&server).read_range(0, 4).await);
    assert!(matches!(err, RasterError::Status { status: 404, .. }));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_server_error_retried() {
    let server = FakeServer::bind()
        .await
        .respond(vec![(502, Vec::new()), (206, b"abcd".to_vec())]);

    let bytes = assert_ok!(source(&server).read_range(0, 4).await);
    assert_eq!(&bytes[..], b"abcd");
    assert_eq!(server.requests().len(), 2);

    let server = FakeServer::bind().await.respond(vec![(500, Vec::new())]);
    let err = assert_err!(source(&server).read_range(0, 4).await);
    assert!(matches!(err, RasterError::Status { status: 500, .. }));
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_zero_length_read_skips_request() {
    let server = FakeServer::bind().await.respond(vec![(500, Vec::new())]);

    let bytes = assert_ok!(source(&server).read_range(0, 0).await);
    assert!(bytes.is_empty());
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_geotiff_read_over_http() {
    let grid = TargetGrid::new(Crs::Lambert93, GeoTransform::new(700000.0, 6600020.0, 10.0, -10.0), 3, 2);
    let data = Array2::from_shape_vec((2, 3), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
    let blob = encode_geotiff(data.view(), &grid, -999.0).unwrap();

    let server = FakeServer::bind().await.serve_file(blob);
    let cog = assert_ok!(CogReader::open(source(&server)).await);
    assert_eq!(cog.epsg(), Some(2154));

    let values = assert_ok!(cog.read_block(0).await);
    assert_eq!(values, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    assert!(server
        .requests()
        .iter()
        .all(|r| r.header("range").is_some_and(|v| v.starts_with("bytes="))));
}
