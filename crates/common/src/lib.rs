/// IPAM - 公共库
/// 
/// 提供引擎与服务层共享的类型、错误处理、分页游标、工具函数等

pub mod errors;
pub mod models;
pub mod pagination;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use models::{AddressRef, AddressState, IpBlockType, PolicyRules, UnusableRange};
pub use pagination::{Page, PageRequest};
