pub mod proxy;
pub mod sources;
pub mod version;
