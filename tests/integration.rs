//! Integration tests for tracy-client.
//!
//! A fake tracer on a loopback socket drives the public client API.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;

use tracy_client::discovery::{bind_discovery_socket, receive_announcement, Announcement};
use tracy_client::protocol::{
    build_enable_request, build_frame, build_list_request, encode_tlv, parse_stream, Command,
    DecodedMessage, HEADER_SIZE,
};
use tracy_client::{Client, ClientBuilder, ProtocolSession, TraceEvent};

const WAIT: Duration = Duration::from_secs(2);

fn list_reply(names: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for name in names {
        body.extend(encode_tlv(name.as_bytes()).unwrap());
    }
    build_frame(Command::TracepointListReply, &body).unwrap()
}

fn trace_push(name: &str, timestamp: u64, payload: &[u8]) -> Vec<u8> {
    let mut body = encode_tlv(name.as_bytes()).unwrap();
    body.extend_from_slice(&timestamp.to_be_bytes());
    body.extend(encode_tlv(payload).unwrap());
    build_frame(Command::TracePush, &body).unwrap()
}

/// Connect a channel client to a fresh listener and accept it.
async fn connect_pair(
    builder: ClientBuilder,
) -> (
    Client<mpsc::UnboundedSender<TraceEvent>>,
    mpsc::UnboundedReceiver<TraceEvent>,
    TcpStream,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (client, events) = builder.address(addr).connect_channel().await.unwrap();
    let (tracer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();

    (client, events, tracer)
}

async fn expect_list_request(tracer: &mut TcpStream) {
    let mut request = [0u8; HEADER_SIZE];
    timeout(WAIT, tracer.read_exact(&mut request))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request, build_list_request());
}

async fn expect_enable_request(tracer: &mut TcpStream, names: &[&str]) {
    let expected = build_enable_request(names.iter().copied()).unwrap();
    let mut request = vec![0u8; expected.len()];
    timeout(WAIT, tracer.read_exact(&mut request))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request, expected);
}

async fn drain(mut events: mpsc::UnboundedReceiver<TraceEvent>) -> Vec<TraceEvent> {
    let mut all = Vec::new();
    while let Some(event) = timeout(WAIT, events.recv()).await.unwrap() {
        all.push(event);
    }
    all
}

/// Connect, discover, enable, receive, disconnect.
#[tokio::test]
async fn test_full_session_against_fake_tracer() {
    let (client, mut events, mut tracer) = connect_pair(Client::builder()).await;

    expect_list_request(&mut tracer).await;

    let mut data = list_reply(&["cpu_idle", "sched_switch"]);
    data.extend(trace_push("cpu_idle", 1_000_000_000, &[0x01, 0x02]));
    tracer.write_all(&data).await.unwrap();

    expect_enable_request(&mut tracer, &["cpu_idle", "sched_switch"]).await;

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.tracepoint_name(), "cpu_idle");
    assert_eq!(event.timestamp_ns, 1_000_000_000);
    assert_eq!(&event.payload[..], &[0x01, 0x02]);

    drop(tracer);
    let sink = timeout(WAIT, client.wait_for_shutdown())
        .await
        .unwrap()
        .unwrap();
    drop(sink);

    assert!(drain(events).await.is_empty());
}

/// Tiny socket reads must not change what is delivered.
#[tokio::test]
async fn test_small_reads_deliver_every_event() {
    let builder = ClientBuilder::new().read_buffer_size(5);
    let (client, events, mut tracer) = connect_pair(builder).await;

    expect_list_request(&mut tracer).await;

    let mut data = list_reply(&["a", "bb"]);
    for i in 0..20u64 {
        let name = if i % 2 == 0 { "a" } else { "bb" };
        data.extend(trace_push(name, i, format!("payload {}", i).as_bytes()));
    }
    tracer.write_all(&data).await.unwrap();

    expect_enable_request(&mut tracer, &["a", "bb"]).await;
    drop(tracer);

    let sink = timeout(WAIT, client.wait_for_shutdown())
        .await
        .unwrap()
        .unwrap();
    drop(sink);

    let received = drain(events).await;
    let timestamps: Vec<u64> = received.iter().map(|e| e.timestamp_ns).collect();
    assert_eq!(timestamps, (0..20).collect::<Vec<_>>());
    assert_eq!(&received[3].payload[..], b"payload 3");
}

/// A corrupt frame is dropped and the connection keeps working.
#[tokio::test]
async fn test_recovers_after_corrupt_frame() {
    let (client, mut events, mut tracer) = connect_pair(Client::builder()).await;
    expect_list_request(&mut tracer).await;

    tracer.write_all(&trace_push("a", 1, b"")).await.unwrap();
    let first = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(first.timestamp_ns, 1);

    let mut corrupt = trace_push("a", 2, b"");
    corrupt[..4].copy_from_slice(b"NoPe");
    tracer.write_all(&corrupt).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tracer.write_all(&trace_push("a", 3, b"")).await.unwrap();
    let next = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(next.timestamp_ns, 3);

    drop(tracer);
    timeout(WAIT, client.wait_for_shutdown())
        .await
        .unwrap()
        .unwrap();
}

/// A second list reply re-enables the full set.
#[tokio::test]
async fn test_new_tracepoints_are_enabled_on_next_reply() {
    let (client, _events, mut tracer) = connect_pair(Client::builder()).await;
    expect_list_request(&mut tracer).await;

    tracer.write_all(&list_reply(&["a"])).await.unwrap();
    expect_enable_request(&mut tracer, &["a"]).await;

    client.request_tracepoints().await.unwrap();
    expect_list_request(&mut tracer).await;

    tracer.write_all(&list_reply(&["b"])).await.unwrap();
    expect_enable_request(&mut tracer, &["a", "b"]).await;

    assert!(client.is_connected());
    drop(tracer);
    timeout(WAIT, client.wait_for_shutdown())
        .await
        .unwrap()
        .unwrap();
}

/// The reassembling session and the stateless parser agree on any chunking.
#[test]
fn test_session_matches_parse_stream_for_any_chunking() {
    let mut data = list_reply(&["cpu_idle"]);
    for i in 0..5u64 {
        data.extend(trace_push("cpu_idle", i * 1000, &vec![i as u8; i as usize]));
    }

    let expected: Vec<TraceEvent> = parse_stream(data.clone())
        .filter_map(|message| match message.unwrap() {
            DecodedMessage::TraceEvent(event) => Some(event),
            DecodedMessage::TracepointsDiscovered(_) => None,
        })
        .collect();
    assert_eq!(expected.len(), 5);

    for chunk_size in 1..=17 {
        let mut session = ProtocolSession::new(Vec::<TraceEvent>::new());
        let mut enables = 0;
        for chunk in data.chunks(chunk_size) {
            if session.on_bytes_received(chunk).unwrap().is_some() {
                enables += 1;
            }
        }

        assert_eq!(enables, 1, "chunk size {}", chunk_size);
        assert_eq!(session.sink(), &expected, "chunk size {}", chunk_size);
    }
}

/// Discover a tracer over UDP and connect to the announced port.
#[tokio::test]
async fn test_discover_then_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let socket = bind_discovery_socket("127.0.0.1:0".parse().unwrap(), None)
        .await
        .unwrap();
    let beacon_target = socket.local_addr().unwrap();

    let announcement = Announcement {
        sequence_nr: 1,
        server_version: "0.1".to_string(),
        protocol_version: "1".to_string(),
        update_interval_msecs: 1000,
        hostname: "localhost".to_string(),
        process_name: "tracer_demo".to_string(),
        port,
    };
    let beacon = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    beacon
        .send_to(&announcement.encode().unwrap(), beacon_target)
        .await
        .unwrap();

    let (addr, received) = timeout(WAIT, receive_announcement(&socket))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, announcement);

    let (client, _events) = ClientBuilder::new()
        .address(addr)
        .connect_channel()
        .await
        .unwrap();
    let (mut tracer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    expect_list_request(&mut tracer).await;

    assert_eq!(client.peer_addr().port(), port);
}
