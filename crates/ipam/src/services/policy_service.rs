/// 地址策略服务

use chrono::Utc;
use common::{Error, PolicyRules, Result};
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::db::models::ip_block::Model as IpBlock;
use crate::db::models::policy::{CreatePolicyDto, NewPolicy};
use crate::db::models::Policy;

pub struct PolicyService {
    state: AppState,
}

impl PolicyService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 创建策略
    pub async fn create_policy(&self, dto: CreatePolicyDto) -> Result<Policy> {
        dto.validate()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        dto.rules.validate()?;

        let policy = self
            .state
            .store
            .insert_policy(NewPolicy {
                name: dto.name,
                description: dto.description,
                unusable_ip_ranges: serde_json::to_value(&dto.rules.unusable_ranges)?,
                unusable_ip_octets: serde_json::to_value(&dto.rules.unusable_octets)?,
                created_at: Utc::now().into(),
            })
            .await?;

        info!("策略 {} ({}) 已创建", policy.id, policy.name);
        Ok(policy)
    }

    /// 获取单个策略
    pub async fn get_policy(&self, policy_id: i64) -> Result<Policy> {
        self.state
            .store
            .find_policy(policy_id)
            .await?
            .ok_or_else(|| Error::PolicyNotFound(policy_id.to_string()))
    }

    /// block 所引用策略的规则，未引用策略时为空规则
    pub async fn rules_for_block(&self, block: &IpBlock) -> Result<PolicyRules> {
        match block.policy_id {
            Some(policy_id) => self.get_policy(policy_id).await?.rules(),
            None => Ok(PolicyRules::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use common::UnusableRange;

    fn dto(name: &str) -> CreatePolicyDto {
        CreatePolicyDto {
            name: name.to_string(),
            description: Some("保留网关".to_string()),
            rules: PolicyRules {
                unusable_ranges: vec![UnusableRange::new(0, 1)],
                unusable_octets: vec![255],
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_get_policy() {
        let service = PolicyService::new(test_support::state());

        let policy = service.create_policy(dto("gateway")).await.unwrap();
        let found = service.get_policy(policy.id).await.unwrap();

        assert_eq!(found.name, "gateway");
        assert_eq!(found.rules().unwrap(), dto("gateway").rules);
    }

    #[tokio::test]
    async fn test_create_policy_validates_name() {
        let service = PolicyService::new(test_support::state());
        let result = service.create_policy(dto("")).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_get_missing_policy() {
        let service = PolicyService::new(test_support::state());
        assert!(matches!(service.get_policy(7).await, Err(Error::PolicyNotFound(_))));
    }
}
