mod handlers;
mod state;

pub use state::{EngineState, ProBackend};
