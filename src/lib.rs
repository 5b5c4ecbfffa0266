pub mod clock;
pub mod config;
pub mod engine;
pub mod filter;
pub mod limits;
pub mod loader;
pub mod model;
pub mod notify;
pub mod observability;
pub mod refresh;
pub mod source;
pub mod topology;
pub mod wire;
