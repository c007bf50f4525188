pub mod config;
pub mod consumed;
pub mod domain;
pub mod error;
pub mod infra;
pub mod outbox;
pub mod state;
pub mod usecase;
pub mod worker;
