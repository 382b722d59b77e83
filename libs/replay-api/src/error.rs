/// Category of a publish failure. Lets the scheduler and the logs tell a
/// dropped connection apart from a broker refusal or a stalled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection to the broker failed or was lost.
    Connection,
    /// The broker or the client refused the message.
    Rejected,
    /// No confirmation arrived within the publish timeout.
    Timeout,
    /// The publisher has been shut down.
    Closed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Connection => f.write_str("connection"),
            ErrorKind::Rejected => f.write_str("rejected"),
            ErrorKind::Timeout => f.write_str("timeout"),
            ErrorKind::Closed => f.write_str("closed"),
        }
    }
}

/// Error returned by [`Publisher::publish`](crate::Publisher::publish).
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
#[derive(Clone, PartialEq, Eq)]
pub struct PublishError {
    kind: ErrorKind,
    message: String,
}

impl PublishError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Connection, message: msg.into() }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Rejected, message: msg.into() }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Timeout, message: msg.into() }
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Closed, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PublishError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_carries_kind_display_does_not() {
        let e = PublishError::timeout("no PUBACK for pkid 7");
        assert_eq!(e.to_string(), "no PUBACK for pkid 7");
        assert_eq!(format!("{e:?}"), "[timeout] no PUBACK for pkid 7");
        assert_eq!(e.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn constructors_set_kind() {
        let e = PublishError::connection("tcp://localhost:1883: connection refused");
        assert_eq!(e.kind(), ErrorKind::Connection);
        assert_eq!(e.message(), "tcp://localhost:1883: connection refused");
        assert_eq!(PublishError::rejected("x").kind(), ErrorKind::Rejected);
        assert_eq!(PublishError::closed("x").kind(), ErrorKind::Closed);
    }
}
