use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an [`ExportDriver`](crate::ExportDriver) run.
///
/// ```text
/// Starting -> Streaming -> Routing -> Verifying -> Streaming -> ... -> Draining -> Stopped
/// ```
///
/// There is no way back from `Stopped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    #[default]
    Starting,
    Streaming,
    Routing,
    Verifying,
    Draining,
    Stopped,
}

impl DriverState {
    pub fn can_transition_to(self, next: DriverState) -> bool {
        use DriverState::*;
        matches!(
            (self, next),
            (Starting, Streaming)
                | (Starting, Draining)
                | (Streaming, Routing)
                | (Streaming, Draining)
                | (Routing, Verifying)
                | (Routing, Streaming)
                | (Routing, Draining)
                | (Verifying, Streaming)
                | (Verifying, Draining)
                | (Draining, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == DriverState::Stopped
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriverState::Starting => "starting",
            DriverState::Streaming => "streaming",
            DriverState::Routing => "routing",
            DriverState::Verifying => "verifying",
            DriverState::Draining => "draining",
            DriverState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
