use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::error::{Result, WhereError};
use crate::format::{display_rows, orientation_gauges, DisplayRow, Gauge};
use crate::session::{SessionHandle, Snapshot, ViewCommand};

/// Push cadence for WebSocket clients (20 Hz)
const PUSH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Serialize)]
struct DashboardFrame {
    snapshot: Snapshot,
    rows: Vec<DisplayRow>,
    gauges: [Gauge; 3],
}

impl DashboardFrame {
    fn new(snapshot: Snapshot) -> Self {
        let rows = display_rows(&snapshot.telemetry);
        let gauges = orientation_gauges(&snapshot.telemetry);
        Self {
            snapshot,
            rows,
            gauges,
        }
    }
}

pub fn router(handle: SessionHandle) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

pub async fn start_dashboard(handle: SessionHandle, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| WhereError::Dashboard(format!("bind {}: {}", addr, e)))?;
    log::info!("[DASHBOARD] Serving at http://{}", addr);

    axum::serve(listener, router(handle))
        .await
        .map_err(|e| WhereError::Dashboard(e.to_string()))
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("dashboard_static.html"))
}

async fn snapshot_handler(State(handle): State<SessionHandle>) -> impl IntoResponse {
    Json(DashboardFrame::new(handle.snapshot()))
}

async fn ws_handler(ws: WebSocketUpgrade, State(handle): State<SessionHandle>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, handle))
}

async fn handle_socket(socket: WebSocket, handle: SessionHandle) {
    let (mut sender, mut receiver) = socket.split();
    let mut snapshots = handle.subscribe();
    let mut first_frame = true;
    let mut push = tokio::time::interval(PUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = push.tick() => {
                match snapshots.has_changed() {
                    Ok(changed) if changed || first_frame => first_frame = false,
                    Ok(_) => continue,
                    // Session is gone
                    Err(_) => break,
                }
                let frame = DashboardFrame::new(snapshots.borrow_and_update().clone());
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        log::warn!("[DASHBOARD] Failed to encode frame: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    // Client disconnected
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ViewCommand>(&text) {
                    Ok(command) => {
                        if handle.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => log::debug!("[DASHBOARD] Ignoring malformed command: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("[DASHBOARD] WebSocket error: {}", e);
                    break;
                }
            },
        }
    }
}
