//! Shared helpers for the backend integration tests.
#![allow(dead_code)]

use chatter_backend_lib::{ws_router, AppState};
use chatter_common::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve `state` on an ephemeral port
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = ws_router::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect");
    socket
}

pub async fn send(socket: &mut Socket, event: &ClientEvent) {
    send_raw(socket, &serde_json::to_string(event).unwrap()).await;
}

pub async fn send_raw(socket: &mut Socket, text: &str) {
    socket.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Next server event, failing the test after `secs`
pub async fn next_event(socket: &mut Socket, secs: u64, context: &str) -> ServerEvent {
    loop {
        let frame = timeout(Duration::from_secs(secs), socket.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {context}"))
            .unwrap_or_else(|| panic!("Stream closed while waiting for {context}"))
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Next server event if one arrives within `millis`
pub async fn try_next_event(socket: &mut Socket, millis: u64) -> Option<ServerEvent> {
    loop {
        let frame = timeout(Duration::from_millis(millis), socket.next())
            .await
            .ok()??
            .ok()?;
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).ok();
        }
    }
}

/// Go online and wait for the presence broadcast that includes `username`
pub async fn go_online(socket: &mut Socket, username: &str) -> Vec<String> {
    send(socket, &ClientEvent::UserOnline(username.to_string())).await;
    loop {
        if let ServerEvent::UserOnline(users) = next_event(socket, 5, "user_online").await {
            if users.iter().any(|u| u == username) {
                return users;
            }
        }
    }
}
