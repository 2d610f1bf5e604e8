pub mod common;
pub mod configs;
pub mod relay;
pub mod resolver;
pub mod server;
pub mod transport;
