//! CLI command handlers. Each command is in its own file.

mod check;
mod config;
mod derive_id;
mod push;

pub use check::run_check;
pub use config::run_config;
pub use derive_id::run_derive_id;
pub use push::{run_push, PushOverrides};
