/// IpBlock 数据模型

use common::pagination::Identified;
use common::IpBlockType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// IpBlock 模型
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ip_blocks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub network_id: String,
    pub cidr: String,
    #[sea_orm(column_name = "type")]
    pub block_type: String,  // public, private
    /// 仅公网 block 填写，唯一索引保证公网 CIDR 全局唯一
    #[sea_orm(unique)]
    pub public_cidr: Option<String>,
    pub policy_id: Option<i64>,

    // 时间戳
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ip_address::Entity")]
    IpAddresses,

    #[sea_orm(
        belongs_to = "super::policy::Entity",
        from = "Column::PolicyId",
        to = "super::policy::Column::Id"
    )]
    Policy,
}

impl Related<super::ip_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IpAddresses.def()
    }
}

impl Related<super::policy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Policy.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn kind(&self) -> IpBlockType {
        self.block_type.parse().unwrap_or_default()
    }
}

impl Identified for Model {
    fn id(&self) -> i64 {
        self.id
    }
}

/// 创建 IpBlock DTO
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateIpBlockDto {
    #[validate(length(min = 1, max = 255))]
    pub network_id: String,

    #[validate(length(min = 1, max = 64))]
    pub cidr: String,

    #[serde(rename = "type", default)]
    pub block_type: Option<IpBlockType>,

    pub policy_id: Option<i64>,
}

impl CreateIpBlockDto {
    pub fn new(network_id: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            cidr: cidr.into(),
            block_type: None,
            policy_id: None,
        }
    }

    pub fn public(mut self) -> Self {
        self.block_type = Some(IpBlockType::Public);
        self
    }

    pub fn with_policy(mut self, policy_id: i64) -> Self {
        self.policy_id = Some(policy_id);
        self
    }
}

/// 写入存储的新 IpBlock
#[derive(Debug, Clone)]
pub struct NewIpBlock {
    pub network_id: String,
    pub cidr: String,
    pub block_type: IpBlockType,
    pub policy_id: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
}
