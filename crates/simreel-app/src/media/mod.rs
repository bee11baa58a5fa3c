pub mod decoder;
pub mod loader;
pub mod player;
pub mod render_loop;
pub mod timecode;
pub mod types;

pub use player::Player;
pub use types::PlayerStatus;
