//! Connection session tests over an in-memory transport.

mod common;

use std::sync::Arc;

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::Encoder;

use switchyard::config::{HttpConfig, WebSocketConfig};
use switchyard::http::{
    encode_request, HttpConnection, HttpError, Method, Request, Response, Status,
};
use switchyard::websocket::handshake::{accept_key, generate_key, upgrade_response};
use switchyard::websocket::{CloseCode, Frame, FrameCodec, MessageAdapter, Opcode};
use switchyard::app::EchoMessages;

use common::{read_frame, read_head};

fn pair() -> (HttpConnection<DuplexStream>, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (
        HttpConnection::new(server, &HttpConfig::default(), &WebSocketConfig::default()),
        client,
    )
}

fn masked(frame: Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    FrameCodec::client(1 << 20).encode(frame, &mut buf).unwrap();
    buf
}

fn upgrade_request(key: &str) -> Request {
    Request::new(Method::GET, "/ws")
        .with_header("Host", "localhost")
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Key", key)
        .with_header("Sec-WebSocket-Version", "13")
}

#[tokio::test]
async fn keep_alive_requests_are_served_in_order() {
    let (mut connection, mut client) = pair();

    let mut bytes = encode_request(&Request::new(Method::GET, "/one")).unwrap().to_vec();
    bytes.extend_from_slice(
        &encode_request(&Request::new(Method::POST, "/two").with_body("chips")).unwrap(),
    );
    client.write_all(&bytes).await.unwrap();
    client.shutdown().await.unwrap();

    let mut paths = Vec::new();
    while let Some(request) = connection.next_request().await {
        let request = request.unwrap();
        paths.push(request.path.clone());
        connection
            .send_response(Response::text(Status::OK, request.path))
            .await
            .unwrap();
    }
    assert_eq!(paths, vec!["/one", "/two"]);
    assert!(!connection.completion().is_set());

    connection.close().await.unwrap();
    let mut written = String::new();
    client.read_to_string(&mut written).await.unwrap();
    assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 2);
    assert!(written.ends_with("/two"));
}

#[tokio::test]
async fn non_keep_alive_request_is_the_last() {
    let (mut connection, mut client) = pair();
    let first = Request::new(Method::GET, "/first").with_header("Connection", "close");
    let mut bytes = encode_request(&first).unwrap().to_vec();
    bytes.extend_from_slice(&encode_request(&Request::new(Method::GET, "/second")).unwrap());
    client.write_all(&bytes).await.unwrap();

    let request = connection.next_request().await.unwrap().unwrap();
    assert_eq!(request.path, "/first");
    assert!(connection.completion().is_set());
    assert!(connection.next_request().await.is_none());
}

#[tokio::test]
async fn requests_stream_yields_errors_once() {
    let (mut connection, mut client) = pair();
    client.write_all(b"GET / HTTP/2.0\r\n\r\n").await.unwrap();

    let requests = connection.requests();
    assert!(matches!(requests.next().await, Some(Err(_))));
    assert!(requests.next().await.is_none());
}

#[tokio::test]
async fn upgrade_relays_frames_until_close() {
    let (mut connection, mut client) = pair();
    let key = generate_key();

    // The first frame travels in the same write as the upgrade request.
    let mut bytes = encode_request(&upgrade_request(&key)).unwrap().to_vec();
    bytes.extend_from_slice(&masked(Frame::text("Fish")));
    client.write_all(&bytes).await.unwrap();

    let request = connection.next_request().await.unwrap().unwrap();
    let response =
        upgrade_response(&request, Arc::new(MessageAdapter::new(EchoMessages))).unwrap();
    let session = tokio::spawn(async move {
        let result = connection.send_response(response).await;
        (connection, result)
    });

    let (head, mut buf) = read_head(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(head.contains(&format!("Sec-WebSocket-Accept: {}\r\n", accept_key(&key))));
    assert!(!head.contains("Content-Length"));

    assert_eq!(read_frame(&mut client, &mut buf).await, Some(Frame::text("Fish")));

    client.write_all(&masked(Frame::ping(&b"hello"[..]))).await.unwrap();
    assert_eq!(
        read_frame(&mut client, &mut buf).await,
        Some(Frame::pong(&b"hello"[..]))
    );

    client
        .write_all(&masked(Frame::binary(vec![1, 2, 3])))
        .await
        .unwrap();
    assert_eq!(
        read_frame(&mut client, &mut buf).await,
        Some(Frame::binary(vec![1, 2, 3]))
    );

    client
        .write_all(&masked(Frame::close(CloseCode::Normal, "bye")))
        .await
        .unwrap();
    let ack = read_frame(&mut client, &mut buf).await.unwrap();
    assert_eq!(ack.opcode, Opcode::Close);
    assert_eq!(
        ack.close_reason(),
        Some((CloseCode::Normal, "Goodbye".to_string()))
    );

    let (mut connection, result) = session.await.unwrap();
    result.unwrap();
    assert!(connection.completion().is_set());
    assert!(connection.next_request().await.is_none());
    assert!(matches!(
        connection
            .send_response(upgrade_response(&request, Arc::new(MessageAdapter::new(EchoMessages))).unwrap())
            .await,
        Err(HttpError::UpgradeUnavailable)
    ));
}

#[tokio::test]
async fn invalid_utf8_after_upgrade_closes_with_1007() {
    let (mut connection, mut client) = pair();
    let key = generate_key();
    client
        .write_all(&encode_request(&upgrade_request(&key)).unwrap())
        .await
        .unwrap();

    let request = connection.next_request().await.unwrap().unwrap();
    let response =
        upgrade_response(&request, Arc::new(MessageAdapter::new(EchoMessages))).unwrap();
    let session = tokio::spawn(async move { connection.send_response(response).await });

    let (_, mut buf) = read_head(&mut client).await;
    client
        .write_all(&masked(Frame::new(true, Opcode::Text, vec![0xC3, 0x28])))
        .await
        .unwrap();

    let close = read_frame(&mut client, &mut buf).await.unwrap();
    assert_eq!(close.close_reason().unwrap().0, CloseCode::InvalidPayload);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn frame_level_handler_sees_raw_frames() {
    use switchyard::websocket::{HandlerFuture, InboundFrames, OutboundFrames, WsFrameHandler};

    /// Replies with the opcode of every inbound frame, then closes.
    struct Opcodes;

    impl WsFrameHandler for Opcodes {
        fn make_frames(&self, inbound: InboundFrames) -> HandlerFuture<'_, OutboundFrames> {
            let frames: OutboundFrames = inbound
                .take(2)
                .map(|frame| Frame::text(format!("{:?}", frame.unwrap().opcode)))
                .chain(futures_util::stream::once(async {
                    Frame::close(CloseCode::GoingAway, "done")
                }))
                .boxed();
            Box::pin(async move { Ok(frames) })
        }
    }

    let (mut connection, mut client) = pair();
    let key = generate_key();
    let mut bytes = encode_request(&upgrade_request(&key)).unwrap().to_vec();
    bytes.extend_from_slice(&masked(Frame::ping(&b""[..])));
    bytes.extend_from_slice(&masked(Frame::binary(vec![9])));
    client.write_all(&bytes).await.unwrap();

    let request = connection.next_request().await.unwrap().unwrap();
    let response = upgrade_response(&request, Arc::new(Opcodes)).unwrap();
    connection.send_response(response).await.unwrap();

    let (_, mut buf) = read_head(&mut client).await;
    assert_eq!(read_frame(&mut client, &mut buf).await, Some(Frame::text("Ping")));
    assert_eq!(read_frame(&mut client, &mut buf).await, Some(Frame::text("Binary")));
    assert_eq!(
        read_frame(&mut client, &mut buf).await.unwrap().close_reason(),
        Some((CloseCode::GoingAway, "done".to_string()))
    );
}
