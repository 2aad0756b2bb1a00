//! ports - 抽象 trait 层
//!
//! 定义持久化协作方的抽象接口

mod repository;

pub use repository::*;
