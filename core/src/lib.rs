pub mod connectivity;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod service;
pub mod storage;
