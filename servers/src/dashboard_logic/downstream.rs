use crate::dashboard_logic::config::Config;
use crate::dashboard_logic::model::{ClientMessage, ServerMessage};
use crate::dashboard_logic::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

pub async fn run(config: Config, app_state: AppState, mut shutdown: broadcast::Receiver<()>) {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/snapshot/{domain}", get(snapshot_handler))
        .route("/api/refresh/{domain}", post(refresh_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    log::info!("Downstream server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
        })
        .await
        .unwrap();
}

async fn health_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status_json())
}

async fn snapshot_handler(
    Path(domain): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Unknown domains are simply uninitialized: the idle sentinel comes
    // back with status "idle" rather than a 404.
    Json(state.snapshot_json(&domain))
}

async fn refresh_handler(
    Path(domain): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let started = state.refresh(&domain).await;
    Json(serde_json::json!({ "domain": domain, "started": started }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    log::info!("Dashboard client {} connected", client_id);

    let mut watched: HashSet<String> = HashSet::new();
    let mut change_rx = state.change_tx.subscribe();

    loop {
        tokio::select! {
            // Handle incoming messages from the dashboard client
            incoming = socket.next() => {
                let Some(Ok(msg)) = incoming else {
                    break; // client disconnected
                };
                match msg {
                    Message::Text(text) => {
                        let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) else {
                            let reply = ServerMessage::error("unrecognized message");
                            if send_json(&mut socket, &reply).await.is_err() {
                                break;
                            }
                            continue;
                        };
                        if let Some(domains) = client_msg.subscribe {
                            for domain in domains {
                                // Immediately push the current snapshot so a
                                // freshly subscribed widget is never empty.
                                if watched.insert(domain.clone()) {
                                    let snapshot = ServerMessage::snapshot(
                                        &domain,
                                        state.snapshot_json(&domain),
                                    );
                                    if send_json(&mut socket, &snapshot).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        if let Some(domains) = client_msg.unsubscribe {
                            for domain in domains {
                                watched.remove(&domain);
                            }
                        }
                        if let Some(domain) = client_msg.refresh {
                            state.refresh(&domain).await;
                        }
                        if send_json(&mut socket, &ServerMessage::ack()).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => {
                        break;
                    }
                    _ => {}
                }
            }
            // Push committed transitions for watched domains
            changed = change_rx.recv() => {
                match changed {
                    Ok(domains) => {
                        for domain in domains.iter().filter(|d| watched.contains(d.as_str())) {
                            let snapshot = ServerMessage::snapshot(
                                domain.as_str(),
                                state.snapshot_json(domain.as_str()),
                            );
                            if send_json(&mut socket, &snapshot).await.is_err() {
                                log::info!("Dashboard client {} disconnected", client_id);
                                return;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("client {} lagged, {} change events dropped", client_id, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    log::info!("Dashboard client {} disconnected", client_id);
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let json_str = serde_json::to_string(message).unwrap_or_default();
    socket.send(Message::Text(json_str.into())).await
}
