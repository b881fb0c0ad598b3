use serde::{Deserialize, Serialize};

use super::domain::ContractStatus;

/// Events that drive the contract state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractEvent {
    Send,
    DriverSign,
    Reject,
    Activate,
    Suspend,
    Resume,
    End,
    Delete,
}

impl ContractEvent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::DriverSign => "driver_sign",
            Self::Reject => "reject",
            Self::Activate => "activate",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::End => "end",
            Self::Delete => "delete",
        }
    }
}

/// Result of a legal transition: either a new status or removal of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Move(ContractStatus),
    Remove,
}

/// The contract transition table. Returns `None` for any event not listed for
/// the current state; preconditions and side effects are enforced by the
/// service layer around this function.
pub const fn apply(status: ContractStatus, event: ContractEvent) -> Option<TransitionOutcome> {
    use ContractEvent as Event;
    use ContractStatus as Status;
    use TransitionOutcome::{Move, Remove};

    match (status, event) {
        (Status::Draft, Event::Send) => Some(Move(Status::SentToDriver)),
        (Status::Draft, Event::Delete) => Some(Remove),
        (Status::SentToDriver, Event::DriverSign) => Some(Move(Status::SignedByDriver)),
        (Status::SentToDriver, Event::Reject) => Some(Move(Status::Cancelled)),
        (Status::SignedByDriver, Event::Reject) => Some(Move(Status::Cancelled)),
        (Status::SignedByDriver, Event::Activate) => Some(Move(Status::Active)),
        (Status::Active, Event::Suspend) => Some(Move(Status::Paused)),
        (Status::Paused, Event::Resume) => Some(Move(Status::Active)),
        (Status::Active, Event::End) | (Status::Paused, Event::End) => Some(Move(Status::Ended)),
        _ => None,
    }
}
