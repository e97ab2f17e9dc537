//! Message - the unit of distribution

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Opaque text payload
///
/// Cloning is cheap (reference counted), so one message can be handed to
/// every registered target without copying the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message(Arc<str>);

impl Message {
    /// Create a message from any text
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Borrow the message text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Message bytes as sent over the wire
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Deref for Message {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Message {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self(text.into())
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_clone_shares_text() {
        let msg = Message::from("alert");
        let copy = msg.clone();
        assert_eq!(msg, copy);
        assert_eq!(copy.as_str(), "alert");
        assert_eq!(copy.len(), 5);
    }

    #[test]
    fn test_message_display() {
        let msg = Message::new(String::from("hello"));
        assert_eq!(msg.to_string(), "hello");
        assert_eq!(msg.as_bytes(), b"hello");
    }
}
