/// IpBlock 管理服务

use chrono::Utc;
use common::utils::parse_cidr;
use common::{Error, IpBlockType, Page, PageRequest, Result};
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::db::models::ip_block::{CreateIpBlockDto, NewIpBlock};
use crate::db::models::IpBlock;
use crate::services::PolicyService;

pub struct IpBlockService {
    state: AppState,
}

impl IpBlockService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 创建 IpBlock
    pub async fn create_block(&self, dto: CreateIpBlockDto) -> Result<IpBlock> {
        dto.validate()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let cidr = dto.cidr.trim().to_string();
        parse_cidr(&cidr)?;

        let block_type = dto.block_type.unwrap_or_default();
        let store = &self.state.store;

        if let Some(policy_id) = dto.policy_id {
            PolicyService::new(self.state.clone()).get_policy(policy_id).await?;
        }

        if block_type == IpBlockType::Public && store.find_public_block_by_cidr(&cidr).await?.is_some() {
            return Err(Error::DuplicatePublicCidr(cidr));
        }

        let block = store
            .insert_block(NewIpBlock {
                network_id: dto.network_id,
                cidr,
                block_type,
                policy_id: dto.policy_id,
                created_at: Utc::now().into(),
            })
            .await?;

        info!("IpBlock {} ({}, {}) 已创建", block.id, block.cidr, block.block_type);
        Ok(block)
    }

    /// 获取单个 IpBlock
    pub async fn get_block(&self, block_id: i64) -> Result<IpBlock> {
        self.state
            .store
            .find_block(block_id)
            .await?
            .ok_or_else(|| Error::IpBlockNotFound(block_id.to_string()))
    }

    /// 获取 IpBlock 列表（按创建顺序）
    pub async fn list_blocks(&self, page: &PageRequest) -> Result<Page<IpBlock>> {
        self.state
            .store
            .list_blocks(page, self.state.settings.max_page_limit)
            .await
    }

    /// 按网络 id 查找 IpBlock
    pub async fn find_blocks_by_network_id(&self, network_id: &str) -> Result<Vec<IpBlock>> {
        self.state.store.find_blocks_by_network_id(network_id).await
    }

    /// 删除 IpBlock
    ///
    /// 持有 block 锁，等待进行中的分配完成后再删除。
    pub async fn delete_block(&self, block_id: i64) -> Result<()> {
        let _guard = self.state.block_locks.acquire(block_id).await;
        self.state.store.delete_block(block_id).await?;
        self.state.block_locks.forget(block_id).await;

        info!("IpBlock {} 已删除", block_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::policy::CreatePolicyDto;
    use crate::services::{test_support, AllocationService};
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_block() {
        let service = IpBlockService::new(test_support::state());

        let block = service
            .create_block(CreateIpBlockDto::new("300", "10.1.1.0/2"))
            .await
            .unwrap();

        assert_eq!(block.cidr, "10.1.1.0/2");
        assert_eq!(block.kind(), IpBlockType::Private);
        assert_eq!(service.find_blocks_by_network_id("300").await.unwrap(), vec![block]);
    }

    #[tokio::test]
    async fn test_cannot_create_duplicate_public_cidr() {
        let service = IpBlockService::new(test_support::state());

        service
            .create_block(CreateIpBlockDto::new("12200", "192.1.1.1/2").public())
            .await
            .unwrap();

        let duplicate = service
            .create_block(CreateIpBlockDto::new("22200", "192.1.1.1/2").public())
            .await;
        assert!(matches!(duplicate, Err(Error::DuplicatePublicCidr(_))));

        let private = service
            .create_block(CreateIpBlockDto::new("32200", "192.1.1.1/2"))
            .await;
        assert!(private.is_ok());
    }

    #[tokio::test]
    async fn test_create_with_bad_cidr() {
        let service = IpBlockService::new(test_support::state());
        let result = service.create_block(CreateIpBlockDto::new("300", "10...")).await;
        assert!(matches!(result, Err(Error::InvalidCidr(_))));
    }

    #[tokio::test]
    async fn test_create_with_missing_policy() {
        let service = IpBlockService::new(test_support::state());
        let result = service
            .create_block(CreateIpBlockDto::new("300", "10.0.0.0/24").with_policy(99))
            .await;
        assert!(matches!(result, Err(Error::PolicyNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_with_policy() {
        let state = test_support::state();
        let policy = PolicyService::new(state.clone())
            .create_policy(CreatePolicyDto {
                name: "default".to_string(),
                description: None,
                rules: Default::default(),
            })
            .await
            .unwrap();

        let block = IpBlockService::new(state)
            .create_block(CreateIpBlockDto::new("300", "10.0.0.0/24").with_policy(policy.id))
            .await
            .unwrap();
        assert_eq!(block.policy_id, Some(policy.id));
    }

    #[tokio::test]
    async fn test_index_with_pagination() {
        let state = test_support::state();
        let mut blocks = Vec::new();
        for cidr in ["10.1.1.0/32", "10.2.1.0/32", "10.3.1.0/32", "10.4.1.0/32"] {
            blocks.push(test_support::block(&state, cidr).await);
        }
        let service = IpBlockService::new(state);

        let all = service.list_blocks(&PageRequest::default()).await.unwrap();
        assert_eq!(all.items, blocks);
        assert_eq!(all.next_marker, None);

        let page = service
            .list_blocks(&PageRequest::after(blocks[1].id, 2))
            .await
            .unwrap();
        assert_eq!(page.items, vec![blocks[2].clone(), blocks[3].clone()]);

        let empty = service.list_blocks(&PageRequest::first(0)).await.unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(empty.next_marker, None);
    }

    #[tokio::test]
    async fn test_delete_block() {
        let state = test_support::state();
        let block = test_support::block(&state, "10.1.1.0/28").await;
        let service = IpBlockService::new(state);

        service.delete_block(block.id).await.unwrap();
        assert!(matches!(service.get_block(block.id).await, Err(Error::IpBlockNotFound(_))));
        assert!(matches!(service.delete_block(block.id).await, Err(Error::IpBlockNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_block_with_addresses() {
        let state = test_support::state();
        let block = test_support::block(&state, "10.1.1.0/28").await;
        AllocationService::new(state.clone())
            .allocate_ip(block.id, None, None)
            .await
            .unwrap();

        let result = IpBlockService::new(state).delete_block(block.id).await;
        assert!(matches!(result, Err(Error::IpBlockInUse(_))));
    }

    #[tokio::test]
    async fn test_delete_block_waits_for_pending_allocation() {
        let state = test_support::state();
        let block = test_support::block(&state, "10.1.1.0/28").await;
        let block_id = block.id;

        let guard = state.block_locks.acquire(block_id).await;
        let allocator = AllocationService::new(state.clone());
        let allocation = tokio::spawn(async move { allocator.allocate_ip(block_id, None, None).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let service = IpBlockService::new(state.clone());
        let deletion = tokio::spawn(async move { service.delete_block(block_id).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!deletion.is_finished());

        drop(guard);

        let ip = allocation.await.unwrap().unwrap();
        assert_eq!(ip.address, "10.1.1.0");
        assert!(matches!(deletion.await.unwrap(), Err(Error::IpBlockInUse(_))));

        // 地址仍归属于存在的 block
        let service = IpBlockService::new(state);
        assert_eq!(service.get_block(block_id).await.unwrap(), block);
    }
}
