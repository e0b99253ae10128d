use serde::{Deserialize, Serialize};

/// Classification of a moment relative to a market's trading day.
///
/// The source material's `AFTERHOURS` label and `POSTMARKET` label name the same US
/// post-regular window (16:00-20:00 ET) — `"after-hours"` is this engine's prose term for
/// the `Postmarket` session, not a fifth distinct state. See `DESIGN.md`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Session {
    Premarket,
    Regular,
    Postmarket,
    Closed,
}

impl Session {
    pub fn is_tradeable(&self) -> bool {
        !matches!(self, Session::Closed)
    }
}
