use crate::AppError;

/// Unread-count endpoint and live message channel.
#[async_trait::async_trait]
pub trait MessageService: Send + Sync {
    async fn unread_count(&self) -> Result<u32, AppError>;

    /// Open the live channel. Incoming frames are fed to
    /// [`AppState::handle_live_message`](crate::AppState::handle_live_message).
    async fn connect(&self) -> Result<Box<dyn LiveConnection>, AppError>;
}

/// Handle to an open live channel.
pub trait LiveConnection: Send + Sync {
    fn close(&self) -> Result<(), AppError>;
}

/// No messaging backend: zero unread, inert connection.
#[derive(Debug, Default)]
pub struct NullMessageService;

struct NullConnection;

impl LiveConnection for NullConnection {
    fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageService for NullMessageService {
    async fn unread_count(&self) -> Result<u32, AppError> {
        Ok(0)
    }

    async fn connect(&self) -> Result<Box<dyn LiveConnection>, AppError> {
        Ok(Box::new(NullConnection))
    }
}

/// Whether a live frame is an unread chat message.
///
/// Shape: `{"type": "message", "data": {"message": {"read": false, ...}}}`.
pub fn is_unread_message(frame: &serde_json::Value) -> bool {
    frame.get("type").and_then(|t| t.as_str()) == Some("message")
        && !frame
            .pointer("/data/message/read")
            .and_then(|r| r.as_bool())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unread_frames() {
        assert!(is_unread_message(&json!({
            "type": "message",
            "data": {"message": {"read": false, "content": "你好"}}
        })));
        assert!(is_unread_message(&json!({"type": "message", "data": {"message": {}}})));
        assert!(!is_unread_message(&json!({
            "type": "message",
            "data": {"message": {"read": true}}
        })));
        assert!(!is_unread_message(&json!({"type": "typing"})));
    }
}
