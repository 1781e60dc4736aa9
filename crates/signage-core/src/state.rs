/// What the server currently wants shown, as observed by one poll cycle.
///
/// Only the immediately previous value is kept by the reconciler; equality
/// between consecutive observations is what drives (or suppresses) player
/// commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredState {
    /// Play this media URL.
    Media(String),
    /// Nothing assigned — show the waiting screen.
    Idle,
}

/// What the local display subprocess is actually showing.
///
/// Owned exclusively by the reconciliation loop; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    /// Before the first launch attempt.
    Uninitialized,
    /// No subprocess is alive (after a stop or a failed launch).
    Idle,
    /// The waiting-screen placeholder is on screen.
    Waiting,
    /// This media URL is playing.
    Media(String),
}

impl std::fmt::Display for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayState::Uninitialized => write!(f, "uninitialized"),
            DisplayState::Idle => write!(f, "idle"),
            DisplayState::Waiting => write!(f, "waiting"),
            DisplayState::Media(url) => write!(f, "media {}", url),
        }
    }
}
