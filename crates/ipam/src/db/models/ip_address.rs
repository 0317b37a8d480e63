/// IpAddress 数据模型

use common::pagination::{Identified, SortOrder};
use common::AddressState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// IpAddress 模型
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ip_addresses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ip_block_id: i64,
    pub address: String,
    /// 地址的数值形式，用于按地址排序
    pub address_value: i64,
    pub used_by: Option<String>,
    pub marked_for_deallocation: bool,

    // 时间戳
    pub allocated_at: DateTimeWithTimeZone,
    pub deallocated_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ip_block::Entity",
        from = "Column::IpBlockId",
        to = "super::ip_block::Column::Id"
    )]
    IpBlock,
}

impl Related<super::ip_block::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IpBlock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 计算当前状态，`reusable_before` 之前被标记释放的地址视为隔离期已过
    pub fn state(&self, reusable_before: DateTimeWithTimeZone) -> AddressState {
        match (self.marked_for_deallocation, self.deallocated_at) {
            (false, _) => AddressState::Allocated,
            (true, Some(at)) if at <= reusable_before => AddressState::Deallocated,
            (true, _) => AddressState::MarkedForDeallocation,
        }
    }

    /// 隔离期已过，可被重新分配
    pub fn is_reusable(&self, reusable_before: DateTimeWithTimeZone) -> bool {
        self.state(reusable_before) == AddressState::Deallocated
    }
}

impl Identified for Model {
    fn id(&self) -> i64 {
        self.id
    }
}

/// 按地址数值升序
pub struct ByAddressValue;

impl SortOrder<Model> for ByAddressValue {
    type Key = i64;

    fn key(item: &Model) -> i64 {
        item.address_value
    }

    fn key_from_marker(_marker: i64) -> Option<i64> {
        None
    }
}

/// 地址分配请求（写入存储前）
#[derive(Debug, Clone)]
pub struct ClaimAddress {
    pub ip_block_id: i64,
    pub address: String,
    pub address_value: i64,
    pub used_by: Option<String>,
    pub allocated_at: DateTimeWithTimeZone,
    /// 早于该时间标记释放的同地址记录可被复用
    pub reusable_before: DateTimeWithTimeZone,
}
