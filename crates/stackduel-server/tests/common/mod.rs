use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use stackduel_core::net::messages::{ClientMessage, PingMsg, ServerMessage};
use stackduel_core::net::protocol::{decode_server_message, encode_client_message};

use stackduel_server::build_app;
use stackduel_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with a short bag, which keeps `start` frames small.
    pub async fn small_bag() -> Self {
        let mut config = ServerConfig::default();
        config.game.bag_length = 70;
        Self::from_config(config).await
    }

    pub async fn from_config(mut config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        config.listen_addr = addr.to_string();
        config.public_ws_base = format!("ws://{addr}");

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn match_url(&self, room_id: &str, player_id: &str) -> String {
        format!(
            "ws://{}/ws/match?roomid={room_id}&playerid={player_id}",
            self.addr
        )
    }
}

/// POST /rooms, optionally joining `room_id`. Returns the raw response.
pub async fn post_room(
    server: &TestServer,
    room_id: Option<&str>,
    player_id: &str,
    key: &str,
) -> reqwest::Response {
    let url = match room_id {
        Some(id) => format!("{}/rooms?roomid={id}", server.base_url()),
        None => format!("{}/rooms", server.base_url()),
    };
    reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({ "playerId": player_id, "key": key }))
        .send()
        .await
        .unwrap()
}

/// Create a room over HTTP. Returns (room_id, ws_url).
pub async fn create_room(server: &TestServer, player_id: &str, key: &str) -> (String, String) {
    let resp = post_room(server, None, player_id, key).await;
    assert_eq!(resp.status(), 202);
    let body: serde_json::Value = resp.json().await.unwrap();
    let room_id = body["room"]["id"].as_str().unwrap().to_string();
    let ws_url = body["ws_url"].as_str().unwrap().to_string();
    (room_id, ws_url)
}

/// GET a JSON endpoint.
pub async fn get_json(server: &TestServer, path: &str) -> serde_json::Value {
    let resp = reqwest::get(format!("{}{path}", server.base_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

/// Poll /healthcheck until it reports `rooms` live rooms.
pub async fn wait_for_room_count(server: &TestServer, rooms: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let health = get_json(server, "/healthcheck").await;
            if health["rooms"] == rooms {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("room count never reached {rooms}"));
}

/// Poll GET /rooms until `room_id` lists `players` members.
pub async fn wait_for_members(server: &TestServer, room_id: &str, players: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let list = get_json(server, "/rooms").await;
            let count = list["rooms"]
                .as_array()
                .unwrap()
                .iter()
                .find(|room| room["id"] == room_id)
                .map(|room| room["players"].as_array().unwrap().len());
            if count == Some(players) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("room {room_id} never had {players} players"));
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Attempt a connection that the server should refuse before upgrading.
/// Returns the HTTP status.
pub async fn ws_connect_status(url: &str) -> u16 {
    match tokio_tungstenite::connect_async(url).await {
        Ok(_) => panic!("expected {url} to be refused"),
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => resp.status().as_u16(),
        Err(e) => panic!("unexpected connect error: {e}"),
    }
}

/// Connect both players of a fresh room and drain the `ready` broadcast.
pub async fn connect_pair(server: &TestServer, a: &str, b: &str) -> (String, WsStream, WsStream) {
    let (room_id, ws_url) = create_room(server, a, "").await;
    let mut first = ws_connect(&ws_url).await;
    // the join lands after the upgrade, so pin the order before the second dials
    wait_for_members(server, &room_id, 1).await;
    let mut second = ws_connect(&server.match_url(&room_id, b)).await;
    for stream in [&mut first, &mut second] {
        match ws_read_server_msg(stream).await {
            ServerMessage::Ready(occupancy) => assert_eq!(occupancy.players, vec![a, b]),
            other => panic!("Expected ready, got: {other:?}"),
        }
    }
    (room_id, first, second)
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

pub async fn ws_send_ping(stream: &mut WsStream, sent_at: i64) {
    ws_send_client_msg(stream, &ClientMessage::Ping(PingMsg { sent_at })).await;
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_server_message(text.as_str()).unwrap(),
                Some(Ok(Message::Close(frame))) => panic!("WebSocket closed unexpectedly: {frame:?}"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a ServerMessage, returning None on timeout.
pub async fn ws_try_read_server_msg(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_server_message(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read messages until one matches `pred`, skipping the rest (5s timeout).
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws_read_server_msg(stream).await;
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("Timed out waiting for a matching message")
}

/// Wait for the server to close the socket. Returns the close code, if any.
pub async fn ws_expect_close(stream: &mut WsStream) -> Option<u16> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("Timed out waiting for close")
}
