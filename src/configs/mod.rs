pub mod base;
pub mod relay;
pub mod resolver;
pub mod server;

pub use base::*;
pub use relay::*;
pub use resolver::*;
pub use server::*;
