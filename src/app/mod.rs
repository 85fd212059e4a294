pub mod keyboard_input;

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;

#[cfg(test)]
mod tests;

pub use keyboard_input::KeyboardInputHandler;
pub use orchestrator::PopupCamOrchestrator;
pub use types::{RuntimeOptions, ShutdownReason};
