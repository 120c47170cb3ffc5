//! End-to-end tests against a running server.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use switchyard::http::{handler_fn, BoxError, Request, Response, Status};

use common::{start_app, start_server, test_config};

#[tokio::test]
async fn serves_banner_and_echo() {
    let server = start_app().await;
    let client = reqwest::Client::new();

    let banner = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(banner.status(), 200);
    assert!(banner.text().await.unwrap().starts_with("switchyard "));

    let echo = client
        .post(server.url("/echo"))
        .header("content-type", "text/plain")
        .body("Fish & Chips")
        .send()
        .await
        .unwrap();
    assert_eq!(echo.status(), 200);
    assert_eq!(
        echo.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(echo.text().await.unwrap(), "Fish & Chips");

    let missing = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn handler_errors_become_500() {
    let handler = handler_fn(|_request: Request| async move {
        Err::<Response, BoxError>("broken".into())
    });
    let server = start_server(test_config(), handler).await;

    let response = reqwest::get(server.url("/anything")).await.unwrap();
    assert_eq!(response.status(), 500);

    server.stop().await;
}

#[tokio::test]
async fn pipelined_requests_share_one_connection() {
    let server = start_app().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    stream
        .write_all(
            b"POST /echo HTTP/1.1\r\nContent-Length: 4\r\n\r\nFishPOST /echo HTTP/1.1\r\nContent-Length: 5\r\nConnection: close\r\n\r\nChips",
        )
        .await
        .unwrap();

    let mut written = String::new();
    stream.read_to_string(&mut written).await.unwrap();
    assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 2);
    assert!(written.find("Fish").unwrap() < written.find("Chips").unwrap());

    server.stop().await;
}

#[tokio::test]
async fn http_1_0_connection_closes_after_response() {
    let server = start_app().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    stream.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
    let mut written = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut written))
        .await
        .unwrap()
        .unwrap();
    assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));

    server.stop().await;
}

#[tokio::test]
async fn websocket_echo_and_close() {
    let server = start_app().await;
    let (mut ws, response) = tokio_tungstenite::connect_async(server.ws_url("/ws"))
        .await
        .unwrap();
    assert_eq!(response.status(), 101);

    ws.send(Message::Text("Fish".into())).await.unwrap();
    match ws.next().await {
        Some(Ok(Message::Text(text))) => assert_eq!(text.as_str(), "Fish"),
        other => panic!("expected text echo, got {other:?}"),
    }

    ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    match ws.next().await {
        Some(Ok(Message::Binary(data))) => assert_eq!(&data[..], &[1, 2, 3]),
        other => panic!("expected binary echo, got {other:?}"),
    }

    ws.send(Message::Ping(b"are you there".to_vec().into()))
        .await
        .unwrap();
    match ws.next().await {
        Some(Ok(Message::Pong(data))) => assert_eq!(&data[..], b"are you there"),
        other => panic!("expected pong, got {other:?}"),
    }

    ws.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "done".into(),
    })))
    .await
    .unwrap();
    match ws.next().await {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 1000);
            assert_eq!(frame.reason.as_str(), "Goodbye");
        }
        other => panic!("expected close acknowledgement, got {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn plain_request_to_websocket_route_is_rejected() {
    let server = start_app().await;
    let response = reqwest::get(server.url("/ws")).await.unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.headers().get("sec-websocket-version").unwrap(),
        "13"
    );
    server.stop().await;
}

#[tokio::test]
async fn stopped_server_refuses_connections() {
    let server = start_app().await;
    let addr = server.addr;
    assert!(server.shutdown.receiver_count() >= 1);
    server.stop().await;

    let result = TcpStream::connect(addr).await;
    assert!(result.is_err());
}
