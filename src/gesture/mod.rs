pub mod blink;
pub mod coordinator;
pub mod head_shake;
pub mod profile;
pub mod runtime;
pub mod sink;
pub mod types;

use thiserror::Error;

pub use coordinator::{CoordinatorState, GestureCoordinator};
pub use profile::{DispatchMode, GestureProfile};
pub use runtime::GestureRuntime;
pub use sink::EventSink;

#[derive(Debug, Error)]
pub enum GestureError {
    #[error("invalid gesture profile: {0}")]
    InvalidProfile(String),
    #[error("gesture runtime is not running")]
    RuntimeClosed,
}
