/// 地址策略数据模型

use common::PolicyRules;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

/// 策略模型
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "policies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unusable_ip_ranges: JsonValue,
    pub unusable_ip_octets: JsonValue,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ip_block::Entity")]
    IpBlocks,
}

impl Related<super::ip_block::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IpBlocks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 解析策略规则
    pub fn rules(&self) -> common::Result<PolicyRules> {
        Ok(PolicyRules {
            unusable_ranges: serde_json::from_value(self.unusable_ip_ranges.clone())?,
            unusable_octets: serde_json::from_value(self.unusable_ip_octets.clone())?,
        })
    }
}

/// 创建策略 DTO
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePolicyDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub description: Option<String>,

    #[serde(flatten)]
    pub rules: PolicyRules,
}

/// 写入存储的新策略
#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub name: String,
    pub description: Option<String>,
    pub unusable_ip_ranges: JsonValue,
    pub unusable_ip_octets: JsonValue,
    pub created_at: DateTimeWithTimeZone,
}
