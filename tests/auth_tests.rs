//! Unit tests for the request extractors

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderValue, Request};
use haravan_chat_api::api::{ClientIp, ExtractAuthorization};
use std::net::SocketAddr;

#[tokio::test]
async fn test_extract_authorization_present() {
    let req = Request::builder()
        .header("Authorization", "Bearer s3cret")
        .body(())
        .unwrap();

    let (mut parts, _) = req.into_parts();
    let result = ExtractAuthorization::from_request_parts(&mut parts, &()).await;

    assert_eq!(result.unwrap().0.as_deref(), Some("Bearer s3cret"));
}

#[tokio::test]
async fn test_extract_authorization_missing_header() {
    let req = Request::builder().body(()).unwrap();

    let (mut parts, _) = req.into_parts();
    let result = ExtractAuthorization::from_request_parts(&mut parts, &()).await;

    assert!(result.unwrap().0.is_none());
}

#[tokio::test]
async fn test_extract_authorization_invalid_utf8_counts_as_missing() {
    let mut req = Request::builder().body(()).unwrap();
    req.headers_mut().insert(
        "Authorization",
        HeaderValue::from_bytes(&[0xFF, 0xFE]).unwrap(),
    );

    let (mut parts, _) = req.into_parts();
    let result = ExtractAuthorization::from_request_parts(&mut parts, &()).await;

    assert!(result.unwrap().0.is_none());
}

#[tokio::test]
async fn test_client_ip_prefers_first_forwarded_entry() {
    let mut req = Request::builder()
        .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .body(())
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo("127.0.0.1:5000".parse::<SocketAddr>().unwrap()));

    let (mut parts, _) = req.into_parts();
    let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

    assert_eq!(ip.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn test_client_ip_falls_back_to_peer_address() {
    let mut req = Request::builder().body(()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo("192.168.1.20:5000".parse::<SocketAddr>().unwrap()));

    let (mut parts, _) = req.into_parts();
    let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

    assert_eq!(ip.as_deref(), Some("192.168.1.20"));
}

#[tokio::test]
async fn test_client_ip_unknown_without_connect_info() {
    let req = Request::builder().body(()).unwrap();

    let (mut parts, _) = req.into_parts();
    let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

    assert!(ip.is_none());
}
