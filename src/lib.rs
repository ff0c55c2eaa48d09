//! Library crate for port-probe-rs exposing the scanning engine.
pub mod error;
pub mod output;
pub mod ports;
pub mod probe;
pub mod report;
pub mod scanner;
pub mod services;
pub mod types;
