pub mod poller;
pub mod service;
