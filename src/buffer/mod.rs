pub mod controller;
pub mod debounce;

pub use controller::{FlushController, FlushOutcome, Snapshot};
pub use debounce::Debounce;
