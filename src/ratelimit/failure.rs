//! Behavior of the distributed limiter when its store cannot be reached.

use serde::{Deserialize, Serialize};

use super::store::StoreError;

/// What to do with a request when the counter store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Admit the request and swallow the error.
    FailOpen,
    /// Deny the request and hand the error to the caller.
    #[default]
    FailClosed,
}

impl FailureMode {
    /// Turn a store failure into the decision this mode calls for.
    pub fn resolve(self, err: StoreError) -> Result<bool, StoreError> {
        match self {
            FailureMode::FailOpen => Ok(true),
            FailureMode::FailClosed => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_is_fail_closed() {
        assert_eq!(FailureMode::default(), FailureMode::FailClosed);
    }

    #[test]
    fn test_fail_open_admits() {
        let decision = FailureMode::FailOpen.resolve(StoreError::Timeout(Duration::from_millis(50)));
        assert!(decision.unwrap());
    }

    #[test]
    fn test_fail_closed_surfaces_error() {
        let decision = FailureMode::FailClosed.resolve(StoreError::Unavailable("down".to_string()));
        assert!(matches!(decision, Err(StoreError::Unavailable(ref msg)) if msg == "down"));
    }
}
