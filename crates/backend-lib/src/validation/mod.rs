// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Boundary validation for socket events and HTTP bodies.
//!
//! Raw payloads are checked here and converted into typed values before they
//! reach presence, rooms or the message store.

use crate::storage::NewMessage;
use chatter_common::{RoomRequest, SendMessage};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Message body must not be empty")]
    EmptyMessage,
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a username. Names are issued by the auth layer, so anything
/// non-blank is accepted as is.
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if username.trim().is_empty() {
        return Err(ValidationError::InvalidUsername(
            "Username must not be empty".to_string(),
        ));
    }
    Ok(username)
}

/// Validate a message body. The body is stored as sent, untrimmed.
pub fn validate_body(body: &str) -> ValidationResult<&str> {
    if body.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(body)
}

/// Validate a `join_room` payload
pub fn validate_room_request(request: &RoomRequest) -> ValidationResult<()> {
    validate_username(&request.sender)?;
    validate_username(&request.receiver)?;
    Ok(())
}

/// Validate a `send_message` payload. All four fields are required.
pub fn validate_send(payload: SendMessage) -> ValidationResult<NewMessage> {
    let timestamp = payload
        .timestamp
        .ok_or(ValidationError::MissingField("timestamp"))?;
    build_new_message(payload.sender, payload.receiver, payload.message, timestamp)
}

/// Validate a `POST /messages` body. A missing timestamp defaults to `now`.
pub fn validate_post(payload: SendMessage, now: DateTime<Utc>) -> ValidationResult<NewMessage> {
    let timestamp = payload.timestamp.unwrap_or(now);
    build_new_message(payload.sender, payload.receiver, payload.message, timestamp)
}

/// Re-check an already typed message before it is persisted
pub fn validate_new_message(message: &NewMessage) -> ValidationResult<()> {
    validate_username(&message.sender)?;
    validate_username(&message.receiver)?;
    validate_body(&message.body)?;
    Ok(())
}

fn build_new_message(
    sender: Option<String>,
    receiver: Option<String>,
    body: Option<String>,
    timestamp: DateTime<Utc>,
) -> ValidationResult<NewMessage> {
    let sender = sender.ok_or(ValidationError::MissingField("sender"))?;
    let receiver = receiver.ok_or(ValidationError::MissingField("receiver"))?;
    let body = body.ok_or(ValidationError::MissingField("message"))?;

    let message = NewMessage {
        sender,
        receiver,
        body,
        timestamp,
    };
    validate_new_message(&message)?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(sender: &str, receiver: &str, message: &str) -> SendMessage {
        SendMessage {
            sender: Some(sender.to_string()),
            receiver: Some(receiver.to_string()),
            message: Some(message.to_string()),
            timestamp: Some(Utc::now()),
            client_id: None,
        }
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("Jane Doe").is_ok());
        assert!(validate_username("a_b").is_ok());

        assert!(matches!(
            validate_username(""),
            Err(ValidationError::InvalidUsername(_))
        ));
        assert!(matches!(
            validate_username("   "),
            Err(ValidationError::InvalidUsername(_))
        ));

        // Long names from the auth layer are not second-guessed
        let long_name = "x".repeat(65);
        assert_eq!(validate_username(&long_name), Ok(long_name.as_str()));
    }

    #[test]
    fn test_validate_body() {
        assert_eq!(validate_body("  hi  "), Ok("  hi  "));
        assert_eq!(validate_body(""), Err(ValidationError::EmptyMessage));
        assert_eq!(validate_body(" \t\n"), Err(ValidationError::EmptyMessage));

        let pasted = "a".repeat(5000);
        assert_eq!(validate_body(&pasted), Ok(pasted.as_str()));
    }

    #[test]
    fn test_validate_send_accepts_complete_payload() {
        let message = validate_send(payload("alice", "bob", "hi")).unwrap();
        assert_eq!(message.sender, "alice");
        assert_eq!(message.receiver, "bob");
        assert_eq!(message.body, "hi");
    }

    #[test]
    fn test_validate_send_rejects_missing_fields() {
        let mut missing_sender = payload("alice", "bob", "hi");
        missing_sender.sender = None;
        assert_eq!(
            validate_send(missing_sender),
            Err(ValidationError::MissingField("sender"))
        );

        let mut missing_receiver = payload("alice", "bob", "hi");
        missing_receiver.receiver = None;
        assert_eq!(
            validate_send(missing_receiver),
            Err(ValidationError::MissingField("receiver"))
        );

        let mut missing_body = payload("alice", "bob", "hi");
        missing_body.message = None;
        assert_eq!(
            validate_send(missing_body),
            Err(ValidationError::MissingField("message"))
        );

        let mut missing_timestamp = payload("alice", "bob", "hi");
        missing_timestamp.timestamp = None;
        assert_eq!(
            validate_send(missing_timestamp),
            Err(ValidationError::MissingField("timestamp"))
        );
    }

    #[test]
    fn test_validate_send_rejects_whitespace_body() {
        assert_eq!(
            validate_send(payload("alice", "bob", "   ")),
            Err(ValidationError::EmptyMessage)
        );
    }

    #[test]
    fn test_validate_post_defaults_timestamp() {
        let now = Utc::now();
        let mut body = payload("alice", "bob", "hi");
        body.timestamp = None;
        let message = validate_post(body, now).unwrap();
        assert_eq!(message.timestamp, now);
    }

    #[test]
    fn test_validate_room_request() {
        let ok = RoomRequest {
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
        };
        assert!(validate_room_request(&ok).is_ok());

        let bad = RoomRequest {
            sender: "alice".to_string(),
            receiver: String::new(),
        };
        assert!(validate_room_request(&bad).is_err());
    }
}
