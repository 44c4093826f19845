//! Top-level power-mode state machine
//!
//! The controller owns the persisted state and every collaborator. It is driven
//! by [`PowerModeController::boot`] once per reset and by
//! [`PowerModeController::tick`] once per loop iteration; both report whether
//! the loop should continue or the device should go to sleep. Deep sleep never
//! returns, so anything the next boot needs is saved before a
//! [`Step::Suspend`] is handed out.

mod controller;
mod refresh;

pub use controller::{ControllerPhase, PowerModeController, Step, SuspendRequest};
