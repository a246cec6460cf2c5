pub mod error;
pub mod reconciler;
pub mod scheduler;
pub mod state;

pub use error::{ReconcileError, Step};
pub use reconciler::{Action, KeyReport, Reconciler};
pub use scheduler::{CycleReport, Scheduler, SkippedContainer};
pub use state::{KeyState, read_key_state};
