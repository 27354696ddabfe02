mod commands;
mod keyboard;

pub use commands::Command;
pub use keyboard::{handle_key_input, match_key};
