// ============================
// crates/client/src/lib.rs
// ============================
//! Client side of the chatter protocol: session controller, unread ledger,
//! socket transport and HTTP API.

pub mod api;
pub mod error;
pub mod ledger;
pub mod session;
pub mod transport;

pub use api::{ChatApi, HttpChatApi};
pub use error::{ClientError, ClientResult};
pub use ledger::{FileLedgerStorage, LedgerStorage, MemoryLedgerStorage, UnreadLedger};
pub use session::{ChatLine, ChatSession, PendingSend, SessionState};
pub use transport::{EventStream, Transport, WsTransport};
