pub mod completion;
pub mod connection;
pub mod power;
pub mod queue;
pub mod session;

pub use completion::Completion;
pub use connection::ConnectionPhase;
pub use power::{PowerGate, PowerUpdate};
pub use queue::{Enqueued, PendingRequest, RequestQueue};
pub use session::Session;
