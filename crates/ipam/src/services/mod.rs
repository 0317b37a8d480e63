pub mod allocation_service;
pub mod block_locks;
pub mod deallocation_service;
pub mod ip_block_service;
pub mod ip_generator;
pub mod nat_service;
pub mod policy_service;

pub use allocation_service::AllocationService;
pub use deallocation_service::DeallocationService;
pub use ip_block_service::IpBlockService;
pub use ip_generator::{IpGenerator, LowestAvailable};
pub use nat_service::NatService;
pub use policy_service::PolicyService;
