pub mod health;
pub mod snapshot;
pub mod ws;
