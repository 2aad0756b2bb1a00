//! 应用层

mod authorization;

pub use authorization::AuthorizationService;
