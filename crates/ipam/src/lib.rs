/// IP 地址管理引擎
///
/// 管理 IpBlock、地址分配与释放、NAT 关联。

pub mod app_state;
pub mod config;
pub mod db;
pub mod services;
pub mod store;

pub use app_state::{AppState, IpamSettings};
pub use config::Config;
pub use services::{
    AllocationService, DeallocationService, IpBlockService, IpGenerator, LowestAvailable, NatService,
    PolicyService,
};
pub use store::{IpamStore, MemoryStore, SeaOrmStore};
