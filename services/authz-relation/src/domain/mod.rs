//! 领域层

pub mod records;
pub mod relation;
