pub mod commands;
pub mod keyboard;

pub use commands::Command;
pub use keyboard::{KeyEvent, KeyboardHub, Shortcuts};
