//! A tus 1.0.0 resumable-upload protocol engine.
//!
//! The engine is host-agnostic: an HTTP framework adapter turns each incoming
//! request into a [`TusRequest`](context::TusRequest), calls
//! [`TusProtocol::invoke`](runner::TusProtocol::invoke) and either sends the
//! returned response or keeps processing the request when it is not a tus
//! request. Storage is pluggable through the [`TusStore`](store::TusStore)
//! trait and its optional role traits; [`InMemoryStore`](store::InMemoryStore)
//! implements all of them.
//!
//! # Architecture
//!
//! ```text
//! host adapter (TusRequest / ProtocolOutcome)
//!        |
//!        v
//! TusProtocol (intents, authorize, version, lock)
//!        |
//!        v
//! IntentHandler (requirements -> hooks -> store action -> hooks)
//!        |
//!        v
//! StoreAdapter (negotiated extensions, typed role accessors)
//!        |
//!        v
//! TusStore + roles (InMemoryStore, or a custom backend)
//! ```

pub mod buffer;
pub mod cancellation;
pub mod checksums;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
mod handlers;
pub mod headers;
pub mod helpers;
pub mod intent;
pub mod lock;
pub mod parsers;
pub(crate) mod requirements;
pub mod runner;
pub mod store;

pub use config::TusConfig;
pub use context::{ProtocolOutcome, TusRequest, TusResponse};
pub use error::{TusError, TusResult};
pub use events::{EventOutcome, Events};
pub use runner::TusProtocol;
pub use store::{InMemoryStore, StoreAdapter, TusStore};
