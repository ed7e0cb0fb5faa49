//! Relay Core - transport-agnostic chat relay library
//!
//! This crate holds everything the chat relay decides: which inbound payloads
//! are accepted, how they are normalized, who receives them, and what a newly
//! connected client is replayed. It has no HTTP or WebSocket dependencies; a
//! transport registers clients and drains their outbound queues.
//!
//! # Example
//!
//! ```no_run
//! use relay_core::Relay;
//!
//! #[tokio::main]
//! async fn main() {
//!     let relay = Relay::with_history();
//!
//!     // A transport accepted a connection
//!     let (alice, mut alice_rx) = relay.connect().await;
//!
//!     // Fresh relay: the replay is an empty array
//!     assert_eq!(alice_rx.recv().await.as_deref(), Some("[]"));
//!
//!     // An inbound text frame from that client
//!     relay
//!         .handle_message(alice, r#"{"name":"","text":"hi"}"#)
//!         .await
//!         .unwrap();
//!
//!     let broadcast = alice_rx.recv().await.unwrap();
//!     println!("{broadcast}"); // [{"name":"unknown","text":"hi"}]
//!
//!     relay.disconnect(alice).await;
//! }
//! ```

mod clients;
mod error;
mod history;
mod record;
mod relay;

pub use clients::{ClientId, ConnectionManager};
pub use error::{MalformedPayload, RelayError};
pub use history::HistoryStore;
pub use record::{ChatRecord, UNKNOWN_NAME};
pub use relay::Relay;
