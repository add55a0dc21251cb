use std::fmt;

/// State of the ICE transport of a monitored connection, as reported by the
/// instrumentation hook.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum IceConnectionState {
    #[default]
    Unspecified,
    New,
    Checking,
    /// At least one working candidate pair was found.
    Connected,
    /// Checking finished and working pairs were found.
    Completed,
    Disconnected,
    Failed,
    Closed,
}

const UNSPECIFIED_STR: &str = "Unspecified";
const ICE_CONNECTION_STATE_NEW_STR: &str = "new";
const ICE_CONNECTION_STATE_CHECKING_STR: &str = "checking";
const ICE_CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const ICE_CONNECTION_STATE_COMPLETED_STR: &str = "completed";
const ICE_CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const ICE_CONNECTION_STATE_FAILED_STR: &str = "failed";
const ICE_CONNECTION_STATE_CLOSED_STR: &str = "closed";

/// takes a string and converts it to IceConnectionState
impl From<&str> for IceConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CONNECTION_STATE_NEW_STR => IceConnectionState::New,
            ICE_CONNECTION_STATE_CHECKING_STR => IceConnectionState::Checking,
            ICE_CONNECTION_STATE_CONNECTED_STR => IceConnectionState::Connected,
            ICE_CONNECTION_STATE_COMPLETED_STR => IceConnectionState::Completed,
            ICE_CONNECTION_STATE_DISCONNECTED_STR => IceConnectionState::Disconnected,
            ICE_CONNECTION_STATE_FAILED_STR => IceConnectionState::Failed,
            ICE_CONNECTION_STATE_CLOSED_STR => IceConnectionState::Closed,
            _ => IceConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            IceConnectionState::New => ICE_CONNECTION_STATE_NEW_STR,
            IceConnectionState::Checking => ICE_CONNECTION_STATE_CHECKING_STR,
            IceConnectionState::Connected => ICE_CONNECTION_STATE_CONNECTED_STR,
            IceConnectionState::Completed => ICE_CONNECTION_STATE_COMPLETED_STR,
            IceConnectionState::Disconnected => ICE_CONNECTION_STATE_DISCONNECTED_STR,
            IceConnectionState::Failed => ICE_CONNECTION_STATE_FAILED_STR,
            IceConnectionState::Closed => ICE_CONNECTION_STATE_CLOSED_STR,
            IceConnectionState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl IceConnectionState {
    /// Connected or Completed.
    pub fn is_established(self) -> bool {
        matches!(
            self,
            IceConnectionState::Connected | IceConnectionState::Completed
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_ice_connection_state() {
        let tests = vec![
            ("Unspecified", IceConnectionState::Unspecified),
            ("new", IceConnectionState::New),
            ("checking", IceConnectionState::Checking),
            ("connected", IceConnectionState::Connected),
            ("completed", IceConnectionState::Completed),
            ("disconnected", IceConnectionState::Disconnected),
            ("failed", IceConnectionState::Failed),
            ("closed", IceConnectionState::Closed),
        ];

        for (state_string, expected_state) in tests {
            assert_eq!(
                IceConnectionState::from(state_string),
                expected_state,
                "testCase: {expected_state}",
            );
            assert_eq!(expected_state.to_string(), state_string);
        }
    }

    #[test]
    fn test_is_established() {
        assert!(IceConnectionState::Connected.is_established());
        assert!(IceConnectionState::Completed.is_established());
        assert!(!IceConnectionState::Checking.is_established());
        assert!(!IceConnectionState::Failed.is_established());
    }
}
