// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_FRAME_MALFORMED: &str = "ws.frame_malformed";
pub const PRESENCE_BROADCAST: &str = "presence.broadcast";
pub const MESSAGE_PERSISTED: &str = "message.persisted";
pub const MESSAGE_REJECTED: &str = "message.rejected";
pub const MESSAGE_PERSIST_FAILED: &str = "message.persist_failed";
pub const MESSAGE_FANOUT: &str = "message.fanout";
