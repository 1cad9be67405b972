mod events;
mod handlers;
mod models;
mod state;

pub use handlers::{router, run_server};
pub use models::SegmentPayload;
pub use state::ServerState;
