#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Loopback APRS-IS server exercising login, receive filtering and send.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    serde_json::json,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{TcpListener, TcpStream},
    },
};

use {
    rarsms_aprs::{AprsChannel, AprsConfig},
    rarsms_channels::{ChannelAdapter, ConnectionState, Message, MessageSink, MessageType},
};

#[derive(Default)]
struct Collect(Mutex<Vec<Message>>);

#[async_trait]
impl MessageSink for Collect {
    async fn deliver(&self, message: Message) {
        self.0.lock().unwrap().push(message);
    }
}

impl Collect {
    async fn wait_for(&self, count: usize) -> Vec<Message> {
        for _ in 0..100 {
            {
                let messages = self.0.lock().unwrap();
                if messages.len() >= count {
                    return messages.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.0.lock().unwrap().clone()
    }
}

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn channel(port: u16, extra: serde_json::Value) -> AprsChannel {
    let mut settings = json!({
        "server": "127.0.0.1",
        "port": port,
        "callsign": "w1aw",
        "passcode": "12345",
        "connect_timeout_secs": 2,
        "login_timeout_secs": 2,
    });
    if let (Some(base), Some(extra)) = (settings.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    AprsChannel::new("aprs_main", AprsConfig::from_value(&settings).unwrap())
}

/// Accept one client, check its login line and answer with `logresp`.
async fn accept_login(
    listener: &TcpListener,
    logresp: &str,
) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = TcpStream::into_split(stream);
    let mut reader = BufReader::new(read);
    let mut login = String::new();
    reader.read_line(&mut login).await.unwrap();
    assert!(
        login.starts_with("user W1AW pass 12345 vers RARSMS-Bridge 2.0 filter r/"),
        "{login}"
    );
    write
        .write_all(format!("# aprsc 2.1.14\r\n{logresp}\r\n").as_bytes())
        .await
        .unwrap();
    (reader, write)
}

async fn next_frame(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end().to_string();
        if !line.starts_with('#') {
            return line;
        }
    }
}

#[tokio::test]
async fn receives_filtered_packets_and_sends_frames() {
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let (mut reader, mut write) =
            accept_login(&listener, "# logresp W1AW verified, server T2TEST").await;
        let feed = [
            "K4XYZ>APRS,TCPIP*,qAC,T2TEST::RARSMS   :Hello bridge{1",
            "K4XYZ>APRS,WIDE1-1,qAR,N0DIG::RARSMS   :Hello bridge{1",
            "K4XYZ>APRS,TCPIP*::N0CALL   :not for the bridge{2",
            "K4XYZ>APRS,TCPIP*::N0CALL   :RARSMS: prefixed works{3",
            "W4ABC-9>APRS,TCPIP*:!3546.77N/07838.29W>Mobile",
        ];
        for line in feed {
            write.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
        }
        let frame = next_frame(&mut reader).await;
        (frame, write)
    });

    let ch = channel(port, json!({}));
    let sink = Arc::new(Collect::default());
    ch.set_message_sink(sink.clone());
    assert!(ch.connect().await);
    assert_eq!(ch.state(), ConnectionState::Connected);

    let received = sink.wait_for(3).await;
    assert_eq!(received.len(), 3, "{received:?}");
    assert_eq!(received[0].content, "Hello bridge");
    assert_eq!(received[0].source_id, "K4XYZ");
    assert_eq!(received[1].content, "prefixed works");
    assert_eq!(received[2].message_type, MessageType::Position);
    assert_eq!(received[2].source_id, "W4ABC-9");

    let mut reply = Message::new("discord_main", "alice", MessageType::Text, "Roger");
    reply.add_target("aprs_main", Some("k4xyz".into()));
    assert!(ch.send_message(&reply).await);

    let (frame, _write) = server.await.unwrap();
    assert_eq!(frame, "W1AW>APRS,TCPIP*::K4XYZ    :Roger{001");

    assert!(ch.disconnect().await);
    assert_eq!(ch.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn unauthorized_senders_are_dropped() {
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let (_reader, mut write) =
            accept_login(&listener, "# logresp W1AW verified, server T2TEST").await;
        for line in [
            "N0CALL>APRS::RARSMS   :let me in{1",
            "W1BBB-7>APRS::RARSMS   :authorized{2",
        ] {
            write.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let ch = channel(port, json!({"authorized_callsigns": ["W1BBB"]}));
    let sink = Arc::new(Collect::default());
    ch.set_message_sink(sink.clone());
    assert!(ch.connect().await);

    let received = sink.wait_for(1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].source_id, "W1BBB-7");

    server.await.unwrap();
    ch.disconnect().await;
}

#[tokio::test]
async fn rejected_login_fails_connect() {
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let _conn = accept_login(&listener, "# logresp W1AW unverified, server T2TEST").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let ch = channel(port, json!({}));
    assert!(!ch.connect().await);
    assert_eq!(ch.state(), ConnectionState::Configured);
    server.await.unwrap();
}

#[tokio::test]
async fn server_close_marks_disconnected() {
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let conn = accept_login(&listener, "# logresp W1AW verified, server T2TEST").await;
        drop(conn);
    });

    let ch = channel(port, json!({}));
    assert!(ch.connect().await);
    server.await.unwrap();

    for _ in 0..100 {
        if ch.state() == ConnectionState::Disconnected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert!(!ch.send_message(&Message::new("x", "y", MessageType::Text, "hi")).await);
}

#[tokio::test]
async fn idle_connection_sends_keepalive() {
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let (mut reader, _write) =
            accept_login(&listener, "# logresp W1AW verified, server T2TEST").await;
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    });

    let ch = channel(port, json!({"keepalive_secs": 1}));
    assert!(ch.connect().await);
    let line = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.trim_end(), "#keepalive");
    ch.disconnect().await;
}

#[tokio::test]
async fn unreachable_server_fails_connect() {
    let (listener, port) = listener().await;
    drop(listener);
    let ch = channel(port, json!({}));
    assert!(!ch.connect().await);
    assert!(!ch.is_connected());
}
