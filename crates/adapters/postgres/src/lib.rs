//! warden-adapter-postgres - PostgreSQL 适配器

mod connection;
mod error;
mod metrics;
mod migration;

pub use connection::*;
pub use error::*;
pub use metrics::*;
pub use migration::*;
