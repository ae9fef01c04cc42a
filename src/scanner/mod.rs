mod batch;
mod controller;
mod loop_worker;
mod session;

pub use batch::scan_batch;
pub use controller::ScanController;
pub use loop_worker::IncrementCallback;
pub use session::{ScanSession, SessionState};
