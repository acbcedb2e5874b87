use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportState {
    Checking,
    AwaitingDecision,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportEvent {
    AlreadySelected,
    SlotsFree,
    SlotsOccupied,
    ReplaceChosen,
    KeepChosen,
    ResolverFailed,
    OccupantMissing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadySelected,
    Kept,
    ResolverFailed,
    ReplaceFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportAction {
    AddCourse,
    RequestDecision,
    RemoveOccupant,
    SkipCourse(SkipReason),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ImportState,
    pub to: ImportState,
    pub event: ImportEvent,
    pub actions: Vec<ImportAction>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ImportTransitionError {
    #[error("invalid import transition from {state:?} using event {event:?}")]
    InvalidTransition { state: ImportState, event: ImportEvent },
}

/// Per-course decision loop. `Resolved` is terminal.
pub fn transition(
    current: ImportState,
    event: ImportEvent,
) -> Result<TransitionOutcome, ImportTransitionError> {
    use ImportAction::{AddCourse, RemoveOccupant, RequestDecision, SkipCourse};
    use ImportState::{AwaitingDecision, Checking, Resolved};

    let (to, actions) = match (current, event) {
        (Checking, ImportEvent::AlreadySelected) => {
            (Resolved, vec![SkipCourse(SkipReason::AlreadySelected)])
        }
        (Checking, ImportEvent::SlotsFree) => (Resolved, vec![AddCourse]),
        (Checking, ImportEvent::SlotsOccupied) => (AwaitingDecision, vec![RequestDecision]),
        (Checking, ImportEvent::OccupantMissing) => {
            (Resolved, vec![SkipCourse(SkipReason::ReplaceFailed)])
        }
        (AwaitingDecision, ImportEvent::ReplaceChosen) => (Checking, vec![RemoveOccupant]),
        (AwaitingDecision, ImportEvent::KeepChosen) => {
            (Resolved, vec![SkipCourse(SkipReason::Kept)])
        }
        (AwaitingDecision, ImportEvent::ResolverFailed) => {
            (Resolved, vec![SkipCourse(SkipReason::ResolverFailed)])
        }
        _ => return Err(ImportTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
