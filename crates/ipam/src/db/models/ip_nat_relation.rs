/// NAT 关联数据模型

use common::pagination::Identified;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// NAT 关联模型（inside local -> inside global 有向对）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ip_nat_relations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub inside_local_address_id: i64,
    pub inside_global_address_id: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ip_address::Entity",
        from = "Column::InsideLocalAddressId",
        to = "super::ip_address::Column::Id"
    )]
    InsideLocal,

    #[sea_orm(
        belongs_to = "super::ip_address::Entity",
        from = "Column::InsideGlobalAddressId",
        to = "super::ip_address::Column::Id"
    )]
    InsideGlobal,
}

impl ActiveModelBehavior for ActiveModel {}

impl Identified for Model {
    fn id(&self) -> i64 {
        self.id
    }
}

/// NAT 查询方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatDirection {
    /// 给定 inside local，查询其 inside globals
    InsideGlobals,
    /// 给定 inside global，查询其 inside locals
    InsideLocals,
}

impl NatDirection {
    /// 构造 (local, global) 有向对
    pub fn pair(&self, address_id: i64, counterpart_id: i64) -> (i64, i64) {
        match self {
            NatDirection::InsideGlobals => (address_id, counterpart_id),
            NatDirection::InsideLocals => (counterpart_id, address_id),
        }
    }

    /// 以 `address_id` 为查询端时，取关联记录中的对端 id
    pub fn counterpart_of(&self, relation: &Model) -> i64 {
        match self {
            NatDirection::InsideGlobals => relation.inside_global_address_id,
            NatDirection::InsideLocals => relation.inside_local_address_id,
        }
    }

    /// 关联记录是否以 `address_id` 为查询端
    pub fn owned_by(&self, relation: &Model, address_id: i64) -> bool {
        match self {
            NatDirection::InsideGlobals => relation.inside_local_address_id == address_id,
            NatDirection::InsideLocals => relation.inside_global_address_id == address_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NatDirection::InsideGlobals => "inside_globals",
            NatDirection::InsideLocals => "inside_locals",
        }
    }
}
