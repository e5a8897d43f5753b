use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use avalon_server::config::ServerConfig;
use avalon_server::engine::MatchEngine;
use avalon_server::server_protocol::{parse_client_message, ParsedClientMessage};
use avalon_server::server_utils::{find_roster_name, normalize_player_name, Recipients};
use avalon_server::types::{GameAction, GamePhase};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const CLOSE_QUEUE_FULL: u16 = 1013;

type SharedState = Arc<AppState>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<String>,
    player: Option<String>,
    /// Cancelled when the server drops the connection.
    kicked: CancellationToken,
}

/// A request handed to the dispatch task.
#[derive(Debug)]
enum Fanout {
    /// Each recipient gets its own projected view.
    Views(Recipients),
    /// The same payload for every recipient.
    Notice { recipients: Recipients, payload: Value },
}

struct AppState {
    board: RwLock<MatchEngine>,
    clients: Mutex<HashMap<String, ClientContext>>,
    fanout: mpsc::Sender<Fanout>,
    outbound_queue: usize,
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();
    init_tracing(&config.log_level);

    let (fanout_tx, fanout_rx) = mpsc::channel::<Fanout>(64);
    let state = Arc::new(AppState {
        board: RwLock::new(MatchEngine::new(config.match_rng())),
        clients: Mutex::new(HashMap::new()),
        fanout: fanout_tx,
        outbound_queue: config.outbound_queue.max(1),
    });
    tokio::spawn(run_dispatch(state.clone(), fanout_rx));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = config.resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.to_string_lossy(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        warn!("static file root not found, serving the API only");
        app
    };

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let board = state.board.read().await;
    let connections = state.clients.lock().await.len();
    Json(json!({
        "phase": board.phase(),
        "status": board.status(),
        "players": board.roster(),
        "connections": connections,
        "halted": board.is_halted(),
        "generatedAtIso": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(state.outbound_queue);
    let kicked = CancellationToken::new();

    state.clients.lock().await.insert(
        client_id.clone(),
        ClientContext {
            tx: tx.clone(),
            player: None,
            kicked: kicked.clone(),
        },
    );
    debug!(client = %client_id, "connection opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer_kicked = kicked.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = writer_kicked.cancelled() => {
                    let frame = CloseFrame {
                        code: CLOSE_QUEUE_FULL,
                        reason: "outbound queue full".into(),
                    };
                    let _ = ws_sender.send(Message::Close(Some(frame))).await;
                    break;
                }
                outbound = rx.recv() => {
                    let Some(payload) = outbound else {
                        break;
                    };
                    if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        let received = tokio::select! {
            _ = kicked.cancelled() => break,
            received = ws_receiver.next() => received,
        };
        let Some(Ok(message)) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => handle_client_message(&state, &client_id, text).await,
                Err(_) => warn!(client = %client_id, "non-utf8 frame dropped"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(&state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        warn!(client = %client_id, "unparseable message dropped");
        return;
    };

    match message {
        ParsedClientMessage::Hello { name } => handle_hello(state, client_id, &name).await,
        ParsedClientMessage::Refresh => {
            let started = state.board.read().await.phase() != GamePhase::NotStarted;
            let recipients = if started {
                Recipients::Only(client_id.to_string())
            } else {
                Recipients::All
            };
            request_fanout(state, Fanout::Views(recipients)).await;
        }
        ParsedClientMessage::Reset => {
            state.board.write().await.reset();
            request_fanout(state, Fanout::Views(Recipients::All)).await;
        }
        ParsedClientMessage::Action(action) => handle_action(state, client_id, action).await,
    }
}

async fn handle_hello(state: &SharedState, client_id: &str, raw_name: &str) {
    let Some(requested) = normalize_player_name(raw_name) else {
        warn!(client = %client_id, "hello without a usable name dropped");
        return;
    };
    let name = {
        let mut board = state.board.write().await;
        let known = find_roster_name(board.roster(), &requested).map(str::to_string);
        match known {
            Some(name) => name,
            None => {
                if let Err(error) = board.add_player(&requested) {
                    warn!(client = %client_id, player = %requested, %error, "join rejected");
                    return;
                }
                requested
            }
        }
    };

    let mut clients = state.clients.lock().await;
    if let Some(client) = clients.get_mut(client_id) {
        client.player = Some(name.clone());
    }
    drop(clients);
    info!(client = %client_id, player = %name, "player bound");
    request_fanout(state, Fanout::Views(Recipients::All)).await;
}

async fn handle_action(state: &SharedState, client_id: &str, action: GameAction) {
    let Some(sender) = bound_player(state, client_id).await else {
        warn!(client = %client_id, "action from unbound connection dropped");
        return;
    };

    let draft = match &action {
        GameAction::SuggestTemporary { players } => Some(players.clone()),
        _ => None,
    };
    let result = state.board.write().await.apply(&sender, action);
    if let Err(error) = result {
        warn!(player = %sender, %error, kind = ?error.kind(), "action rejected");
        return;
    }

    let fanout = match draft {
        Some(players) => Fanout::Notice {
            recipients: Recipients::AllExcept(client_id.to_string()),
            payload: json!({
                "type": "suggestion_tmp",
                "from": sender,
                "players": players,
            }),
        },
        None => Fanout::Views(Recipients::All),
    };
    request_fanout(state, fanout).await;
}

async fn bound_player(state: &SharedState, client_id: &str) -> Option<String> {
    state
        .clients
        .lock()
        .await
        .get(client_id)
        .and_then(|client| client.player.clone())
}

async fn request_fanout(state: &SharedState, fanout: Fanout) {
    if state.fanout.send(fanout).await.is_err() {
        warn!("dispatch task is gone, fan-out dropped");
    }
}

async fn handle_disconnect(state: &SharedState, client_id: &str) {
    let player = {
        let mut clients = state.clients.lock().await;
        let player = clients
            .remove(client_id)
            .and_then(|client| client.player);
        player.filter(|name| {
            !clients
                .values()
                .any(|other| other.player.as_deref() == Some(name.as_str()))
        })
    };
    debug!(client = %client_id, "connection closed");

    if let Some(name) = player {
        release_player(state, &name).await;
    }
    request_fanout(state, Fanout::Views(Recipients::All)).await;
}

/// Drops `name` from the roster while no match is running.
async fn release_player(state: &SharedState, name: &str) {
    if let Err(error) = state.board.write().await.remove_player(name) {
        debug!(player = %name, %error, "player kept on roster");
    }
}

async fn run_dispatch(state: SharedState, mut requests: mpsc::Receiver<Fanout>) {
    while let Some(request) = requests.recv().await {
        let dropped = deliver(&state, request).await;
        if dropped.is_empty() {
            continue;
        }
        for name in &dropped {
            release_player(&state, name).await;
        }
        let _ = deliver(&state, Fanout::Views(Recipients::All)).await;
    }
}

/// Sends one fan-out. Connections whose queue is full are unregistered and told to
/// close; the players they were bound to are returned.
async fn deliver(state: &SharedState, request: Fanout) -> Vec<String> {
    let board = state.board.read().await;
    let mut clients = state.clients.lock().await;

    let mut failed = Vec::new();
    for (client_id, client) in clients.iter() {
        let Some(player) = client.player.as_deref() else {
            continue;
        };
        let payload = match &request {
            Fanout::Views(recipients) if recipients.includes(client_id) => {
                json!({ "type": "state", "view": board.view_for(player) })
            }
            Fanout::Notice {
                recipients,
                payload,
            } if recipients.includes(client_id) => payload.clone(),
            _ => continue,
        };
        if client.tx.try_send(payload.to_string()).is_err() {
            failed.push(client_id.clone());
        }
    }

    let mut dropped = Vec::new();
    for client_id in failed {
        let Some(client) = clients.remove(&client_id) else {
            continue;
        };
        warn!(client = %client_id, "outbound queue full, dropping connection");
        client.kicked.cancel();
        if let Some(player) = client.player {
            dropped.push(player);
        }
    }
    dropped
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use avalon_server::rng::Rng;

    fn test_state(players: &[&str]) -> SharedState {
        let mut board = MatchEngine::new(Rng::new(1));
        for player in players {
            board.add_player(player).expect("roster open");
        }
        let (fanout, _) = mpsc::channel(4);
        Arc::new(AppState {
            board: RwLock::new(board),
            clients: Mutex::new(HashMap::new()),
            fanout,
            outbound_queue: 1,
        })
    }

    async fn connect(
        state: &SharedState,
        client_id: &str,
        player: &str,
    ) -> (mpsc::Receiver<String>, CancellationToken) {
        let (tx, rx) = mpsc::channel(1);
        let kicked = CancellationToken::new();
        state.clients.lock().await.insert(
            client_id.to_string(),
            ClientContext {
                tx,
                player: Some(player.to_string()),
                kicked: kicked.clone(),
            },
        );
        (rx, kicked)
    }

    #[tokio::test]
    async fn full_queue_drops_the_connection() {
        let state = test_state(&["ann", "bob"]);
        let (mut ann_rx, ann_kicked) = connect(&state, "client_a", "ann").await;
        let (_bob_rx, bob_kicked) = connect(&state, "client_b", "bob").await;

        let dropped = deliver(&state, Fanout::Views(Recipients::All)).await;
        assert!(dropped.is_empty());
        assert!(ann_rx.recv().await.is_some());

        let dropped = deliver(&state, Fanout::Views(Recipients::All)).await;
        assert_eq!(dropped, vec!["bob".to_string()]);
        assert!(bob_kicked.is_cancelled());
        assert!(!ann_kicked.is_cancelled());

        let clients = state.clients.lock().await;
        assert!(clients.contains_key("client_a"));
        assert!(!clients.contains_key("client_b"));
    }

    #[tokio::test]
    async fn notices_skip_the_excluded_connection() {
        let state = test_state(&["ann", "bob"]);
        let (mut ann_rx, _) = connect(&state, "client_a", "ann").await;
        let (mut bob_rx, _) = connect(&state, "client_b", "bob").await;

        let notice = Fanout::Notice {
            recipients: Recipients::AllExcept("client_a".to_string()),
            payload: json!({ "type": "suggestion_tmp", "from": "ann", "players": ["bob"] }),
        };
        assert!(deliver(&state, notice).await.is_empty());
        assert!(ann_rx.try_recv().is_err());
        let payload = bob_rx.try_recv().expect("bob is notified");
        assert!(payload.contains("suggestion_tmp"));
    }
}
