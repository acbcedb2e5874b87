//! Time grid and the selection store built on top of it.

pub mod grid;
pub mod store;

pub use grid::{ConflictCheck, Slot, TimeGrid, DEFAULT_MAX_PERIOD};
pub use store::{AddOutcome, CreditStatus, Restored, ScheduleSnapshot, SelectionStore, SlotAssignment};
