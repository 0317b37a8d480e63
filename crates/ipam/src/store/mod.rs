/// 存储抽象层
///
/// 定义 IPAM 引擎依赖的统一存储接口，支持多种存储后端

pub mod memory;
pub mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

use async_trait::async_trait;
use common::{PageRequest, Page, Result};
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::db::models::ip_address::ClaimAddress;
use crate::db::models::ip_block::NewIpBlock;
use crate::db::models::ip_nat_relation::NatDirection;
use crate::db::models::policy::NewPolicy;
use crate::db::models::{IpAddress, IpBlock, Policy};

/// IPAM 存储 Trait
///
/// 每个方法都是一次有界的原子操作；实现负责行级原子性，
/// 同一 block 内的分配串行化由引擎层负责。
#[async_trait]
pub trait IpamStore: Send + Sync + 'static {
    /// 创建策略
    async fn insert_policy(&self, policy: NewPolicy) -> Result<Policy>;

    /// 按 id 查找策略
    async fn find_policy(&self, id: i64) -> Result<Option<Policy>>;

    /// 创建 IpBlock，公网 CIDR 冲突时返回 `DuplicatePublicCidr`
    async fn insert_block(&self, block: NewIpBlock) -> Result<IpBlock>;

    /// 按 id 查找 IpBlock
    async fn find_block(&self, id: i64) -> Result<Option<IpBlock>>;

    /// 按 CIDR 文本查找公网 IpBlock
    async fn find_public_block_by_cidr(&self, cidr: &str) -> Result<Option<IpBlock>>;

    /// 按网络 id 查找 IpBlock（按 id 升序）
    async fn find_blocks_by_network_id(&self, network_id: &str) -> Result<Vec<IpBlock>>;

    /// 分页列出 IpBlock（按 id 升序）
    async fn list_blocks(&self, page: &PageRequest, max_limit: u64) -> Result<Page<IpBlock>>;

    /// 删除 IpBlock，仍有地址记录时返回 `IpBlockInUse`
    async fn delete_block(&self, id: i64) -> Result<()>;

    /// 按 (block, address) 查找地址
    async fn find_address(&self, block_id: i64, address: &str) -> Result<Option<IpAddress>>;

    /// 分页列出 block 内的地址（按地址数值升序）
    async fn list_addresses_in_block(
        &self,
        block_id: i64,
        page: &PageRequest,
        max_limit: u64,
    ) -> Result<Page<IpAddress>>;

    /// block 内不可分配的地址数值（已分配或仍在隔离期）
    async fn unavailable_addresses(
        &self,
        block_id: i64,
        reusable_before: DateTimeWithTimeZone,
    ) -> Result<Vec<u32>>;

    /// 原子地占用一个地址
    ///
    /// 地址不存在时插入；已存在但隔离期已过时复用该记录并清除其 NAT 关联；
    /// 其余情况返回 `AddressAlreadyAllocated`。
    async fn claim_address(&self, claim: ClaimAddress) -> Result<IpAddress>;

    /// 标记地址待释放；已标记的地址保持原释放时间
    async fn mark_for_deallocation(
        &self,
        block_id: i64,
        address: &str,
        at: DateTimeWithTimeZone,
    ) -> Result<IpAddress>;

    /// 清除待释放标记
    async fn restore_address(&self, block_id: i64, address: &str) -> Result<IpAddress>;

    /// 删除隔离期已过的地址及其 NAT 关联，返回删除数量
    async fn purge_deallocated(&self, reusable_before: DateTimeWithTimeZone) -> Result<u64>;

    /// 批量写入 NAT 关联 (local, global)，已存在的关联忽略
    async fn insert_nat_relations(
        &self,
        pairs: &[(i64, i64)],
        created_at: DateTimeWithTimeZone,
    ) -> Result<u64>;

    /// 分页列出某方向的对端地址（按对端 id 升序）
    async fn list_nat_counterparts(
        &self,
        address_id: i64,
        direction: NatDirection,
        page: &PageRequest,
        max_limit: u64,
    ) -> Result<Page<IpAddress>>;

    /// 删除某方向的 NAT 关联；指定对端时只删除该对，返回删除数量
    async fn delete_nat_relations(
        &self,
        address_id: i64,
        direction: NatDirection,
        counterpart_id: Option<i64>,
    ) -> Result<u64>;
}
