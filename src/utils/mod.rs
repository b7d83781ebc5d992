pub mod config;
pub mod hmac;
pub mod logging;
