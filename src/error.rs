use strum::Display;

/// The remote call an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    StartGame,
    SubmitAnswer,
    Undo,
    ListGuesses,
    AcceptAnswer,
    DeclineAnswer,
    ListThemes,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{operation}: transport error: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation}: unexpected response: {reason}")]
    Protocol { operation: Operation, reason: String },
    #[error("{operation}: invalid session state: {reason}")]
    State { operation: Operation, reason: String },
    #[error("no guesses available")]
    NoGuess,
}

impl ClientError {
    pub fn transport(operation: Operation, source: reqwest::Error) -> Self {
        Self::Transport { operation, source }
    }

    pub fn protocol(operation: Operation, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            reason: reason.into(),
        }
    }

    pub fn state(operation: Operation, reason: impl Into<String>) -> Self {
        Self::State {
            operation,
            reason: reason.into(),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            ClientError::Transport { operation, .. }
            | ClientError::Protocol { operation, .. }
            | ClientError::State { operation, .. } => Some(*operation),
            ClientError::NoGuess => None,
        }
    }

    /// Transport failures and missing guesses can be retried or waited out;
    /// the rest mean the session or the caller is out of sync with the service.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClientError::Transport { .. } | ClientError::NoGuess)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn protocol_error_names_operation() {
        let err = ClientError::protocol(Operation::SubmitAnswer, "completion was KO - TIMEOUT");

        assert_eq!(
            err.to_string(),
            "submit_answer: unexpected response: completion was KO - TIMEOUT"
        );
        assert_eq!(err.operation(), Some(Operation::SubmitAnswer));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn no_guess_is_recoverable() {
        assert!(ClientError::NoGuess.is_recoverable());
        assert_eq!(ClientError::NoGuess.operation(), None);
    }
}
