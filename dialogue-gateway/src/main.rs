use axum::routing::{get, post};
use axum::Router;
use dialogue_core::event::{EventDefinition, EventDefinitionOpts, HistoryPolicy};
use dialogue_core::{ClientRegistry, Dispatcher, Hooks, RoomConfig, RoomRegistry};
use serde::Deserialize;
use socketioxide::extract::{SocketRef, TryData};
use socketioxide::SocketIo;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod routes;
mod telemetry;
mod transport;

use config::AppConfig;
use transport::SocketTransport;

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticEventSpec {
    name: String,
    history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticRoomSpec {
    id: String,
    name: String,
    description: Option<String>,
    max_size: Option<usize>,
    #[serde(default)]
    events: Vec<StaticEventSpec>,
    #[serde(default)]
    default_subscriptions: Vec<String>,
}

fn load_static_rooms(rooms: &RoomRegistry, path: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let specs: Vec<StaticRoomSpec> = serde_json::from_str(&raw)?;
    for spec in specs {
        let mut config = RoomConfig::new(spec.id.clone(), spec.name);
        config.description = spec.description;
        config.max_size = spec.max_size;
        config.events = spec
            .events
            .into_iter()
            .map(|e| {
                EventDefinition::new(
                    e.name,
                    EventDefinitionOpts {
                        validator: None,
                        history: e.history_limit.map(HistoryPolicy::new),
                    },
                )
            })
            .collect();
        config.default_subscriptions = spec.default_subscriptions.into_iter().collect::<HashSet<_>>();
        rooms.register(spec.id, config)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("dialogue-gateway");

    let config = AppConfig::load()?;
    let port = config.port;

    let rooms = Arc::new(RoomRegistry::new(Default::default()));
    if let Some(path) = &config.static_rooms_path {
        load_static_rooms(&rooms, path)?;
    }
    let clients = Arc::new(ClientRegistry::new());

    let mut dispatcher = Dispatcher::new(rooms, clients, Hooks::default());
    dispatcher.history_rate_limiter = dialogue_core::RateLimiter::new(
        config.history_rate_limit_max,
        std::time::Duration::from_secs(config.history_rate_limit_window_secs),
    );
    dispatcher.forbid_wildcard_rooms = config.forbid_wildcard_rooms;
    dispatcher.history_rate_limiter.spawn_sweeper(std::time::Duration::from_secs(60));
    let dispatcher = Arc::new(dispatcher);

    let state = Arc::new(AppState {
        dispatcher: dispatcher.clone(),
    });

    let (sio_layer, io) = SocketIo::builder().build_layer();

    io.ns("/", {
        let dispatcher = dispatcher.clone();
        move |io: SocketIo, socket: SocketRef, TryData(auth): TryData<serde_json::Value>| {
            let dispatcher = dispatcher.clone();
            async move {
                let auth = auth.unwrap_or_else(|_| serde_json::json!({}));
                let transport: Arc<dyn dialogue_core::wire::Transport> =
                    Arc::new(SocketTransport::new(io, &socket));

                let Some(client) = dispatcher.connect(transport, auth) else {
                    return;
                };
                socket.extensions.insert(client.clone());

                for verb in [
                    dialogue_core::wire::verb::JOIN,
                    dialogue_core::wire::verb::LEAVE,
                    dialogue_core::wire::verb::SUBSCRIBE,
                    dialogue_core::wire::verb::SUBSCRIBE_ALL,
                    dialogue_core::wire::verb::UNSUBSCRIBE,
                    dialogue_core::wire::verb::TRIGGER,
                    dialogue_core::wire::verb::GET_HISTORY,
                    dialogue_core::wire::verb::LIST_ROOMS,
                    dialogue_core::wire::verb::CREATE_ROOM,
                    dialogue_core::wire::verb::DELETE_ROOM,
                ] {
                    let dispatcher = dispatcher.clone();
                    socket.on(verb, move |socket: SocketRef, socketioxide::extract::Data::<serde_json::Value>(payload)| {
                        let dispatcher = dispatcher.clone();
                        async move {
                            let Some(client) = socket.extensions.get::<Arc<dialogue_core::ConnectedClient>>() else {
                                return;
                            };
                            dispatcher.dispatch(&client, verb, payload).await;
                        }
                    });
                }

                socket.on_disconnect({
                    let dispatcher = dispatcher.clone();
                    move |socket: SocketRef| {
                        let dispatcher = dispatcher.clone();
                        async move {
                            dispatcher.disconnect(socket.id.to_string().as_str());
                        }
                    }
                });
            }
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health_check))
        .route("/rooms", get(routes::list_rooms))
        .route("/rooms/:id/trigger", post(routes::trigger_room))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "dialogue-gateway starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
