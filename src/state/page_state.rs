//! Page state definitions for tracking crawl progress
//!
//! Every frontier entry ends in exactly one terminal state.

use std::fmt;

/// Represents the state of a frontier entry during the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Entry is waiting in the frontier
    Queued,

    /// Entry is being fetched by a worker
    Fetching,

    /// Fetch failed transiently; entry is back in the frontier
    Retrying,

    // ===== Terminal Success States =====
    /// Page was fetched and handed to its page handler
    Processed,

    // ===== Terminal Skip States =====
    /// Server answered with a 4xx status
    ClientError,

    /// Site redirected to its generic error page
    ErrorPage,

    /// Redirect chain was too long or had no usable target
    RedirectFailed,

    /// Fetched page does not belong to any known page shape
    OutOfScope,

    /// Page matched a shape but lacked the expected content
    Unrecognized,

    // ===== Terminal Error States =====
    /// Failure escalated and aborted the crawl
    Fatal,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Fetching | Self::Retrying)
    }

    /// Returns true if this represents a logged-and-skipped page
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::ClientError
                | Self::ErrorPage
                | Self::RedirectFailed
                | Self::OutOfScope
                | Self::Unrecognized
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Processed => "processed",
            Self::ClientError => "client_error",
            Self::ErrorPage => "error_page",
            Self::RedirectFailed => "redirect_failed",
            Self::OutOfScope => "out_of_scope",
            Self::Unrecognized => "unrecognized",
            Self::Fatal => "fatal",
        }
    }

    /// Returns all terminal states, in report order
    pub fn terminal_states() -> [Self; 7] {
        [
            Self::Processed,
            Self::ClientError,
            Self::ErrorPage,
            Self::RedirectFailed,
            Self::OutOfScope,
            Self::Unrecognized,
            Self::Fatal,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!PageState::Queued.is_terminal());
        assert!(!PageState::Fetching.is_terminal());
        assert!(!PageState::Retrying.is_terminal());

        for state in PageState::terminal_states() {
            assert!(state.is_terminal(), "{} should be terminal", state);
        }
    }

    #[test]
    fn test_is_skipped() {
        assert!(PageState::ClientError.is_skipped());
        assert!(PageState::ErrorPage.is_skipped());
        assert!(PageState::RedirectFailed.is_skipped());

        assert!(!PageState::Processed.is_skipped());
        assert!(!PageState::Fatal.is_skipped());
        assert!(!PageState::Retrying.is_skipped());
    }

    #[test]
    fn test_display() {
        assert_eq!(PageState::ClientError.to_string(), "client_error");
        assert_eq!(PageState::Processed.to_string(), "processed");
    }
}
