pub mod config;
pub mod logging;

pub mod dispatch;
pub mod record;
pub mod retry;
pub mod upsert;
