use crate::CoreError;
use quarry_store::HistoryState;
use std::fmt;

/// Installation-level operations gated by history state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Update,
    Revert,
    Changes,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Install => "install",
            Operation::Update => "update",
            Operation::Revert => "revert",
            Operation::Changes => "changes",
        })
    }
}

/// Install needs an empty history; everything else needs at least one revision.
/// No operation ever moves a history back to empty.
pub fn validate_operation(operation: Operation, state: HistoryState) -> Result<(), CoreError> {
    let valid = matches!(
        (operation, state),
        (Operation::Install, HistoryState::Empty)
            | (
                Operation::Update | Operation::Revert | Operation::Changes,
                HistoryState::HasHistory
            )
    );
    if valid {
        Ok(())
    } else {
        let reason = match state {
            HistoryState::Empty => "nothing is installed yet",
            HistoryState::HasHistory => "the installation already has history",
        };
        Err(CoreError::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.to_owned(),
        })
    }
}
