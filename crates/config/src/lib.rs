pub mod config;
pub mod default;
pub mod error;
pub mod loader;
pub mod validator;
