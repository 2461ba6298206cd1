pub mod certcheck;
pub mod cmd;
pub mod config;
pub mod escalate;
pub mod lifecycle;
pub mod sort_data;

#[cfg(unix)]
pub mod service;
