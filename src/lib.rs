pub mod codec;
pub mod config;
pub mod connection;
pub mod frame;
pub mod link;
pub mod reply;
pub mod shell;

pub use config::LinkConfig;
pub use link::{ConnectionState, ExecuteError, LinkEvent, RedisLink};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
