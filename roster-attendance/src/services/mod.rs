pub mod recorder;
pub mod window_registry;

pub use recorder::{AttendancePolicy, AttendanceRecorder, Transition, TransitionOutcome};
pub use window_registry::WindowRegistry;
