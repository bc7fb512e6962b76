pub mod connection;
pub mod error;
pub mod player;
pub mod queue;
pub mod registry;
pub mod session;

pub use error::AudioError;
pub use player::ClipPlayer;
pub use registry::{SessionRegistry, SessionTarget, VoiceDirectory};
pub use session::GuildSession;
