//! Upload session handling and the bounded-concurrency upload queue.

pub mod context;
pub mod queue;
pub mod session;

pub use context::UploadContext;
pub use queue::{ConcurrentUploadQueue, UploadEvent, UploadEventSender};
pub use session::SessionManager;
