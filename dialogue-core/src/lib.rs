//! Routing core: rooms, clients, subscriptions, the trigger pipeline,
//! bounded history, and the hooks that let a transport layer plug in.

pub mod client;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod history;
pub mod hooks;
pub mod message;
pub mod ratelimit;
pub mod registry;
pub mod room;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use client::ConnectedClient;
pub use dispatcher::Dispatcher;
pub use errors::{DialogueError, DialogueResult, WireCode};
pub use event::{EventDefinition, EventDefinitionOpts, HistoryPolicy, Validator, WILDCARD};
pub use history::{CleanupHook, HistoryStore, LoadHook};
pub use hooks::{AuthData, DialogueContext, Hooks};
pub use message::EventMessage;
pub use ratelimit::RateLimiter;
pub use registry::{ClientRegistry, RoomRegistry};
pub use room::{Room, RoomConfig, SyncHistoryOnJoin};
