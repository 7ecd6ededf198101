use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The credentials were missing, invalid, or lack permission.
    Unauthorized,
    /// The provider refused the request as malformed.
    InvalidRequest,
    /// The request did not finish in time.
    Timeout,
    /// The connection to the provider failed or broke.
    Network,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if sending the same request again may succeed.
    ///
    /// Errors caused by the request itself or by the caller's credentials
    /// will fail the same way on every attempt.
    #[inline]
    pub fn is_transient(self) -> bool {
        match self {
            ErrorKind::RateLimitExceeded
            | ErrorKind::Timeout
            | ErrorKind::Network
            | ErrorKind::Other => true,
            ErrorKind::Moderated
            | ErrorKind::Unauthorized
            | ErrorKind::InvalidRequest => false,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Moderated => "moderated",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::Timeout => "timed out",
            ErrorKind::Network => "network error",
            ErrorKind::Other => "other error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::RateLimitExceeded.is_transient());
        assert!(ErrorKind::Network.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Other.is_transient());

        assert!(!ErrorKind::Unauthorized.is_transient());
        assert!(!ErrorKind::InvalidRequest.is_transient());
        assert!(!ErrorKind::Moderated.is_transient());
    }
}
