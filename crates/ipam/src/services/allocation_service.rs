/// 地址分配服务
///
/// 同一 block 的分配在 block 锁内完成"扫描 + 原子占用"，
/// 存储层的 (block, address) 唯一约束兜底跨进程竞争。

use chrono::Utc;
use common::utils::{canonical_address, parse_address, parse_cidr};
use common::{Error, Page, PageRequest, Result};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::db::models::ip_address::ClaimAddress;
use crate::db::models::{IpAddress, IpBlock};
use crate::services::ip_generator::UsableAddresses;
use crate::services::{IpBlockService, PolicyService};

pub struct AllocationService {
    state: AppState,
}

impl AllocationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    async fn usable_addresses(&self, block: &IpBlock) -> Result<UsableAddresses> {
        let network = parse_cidr(&block.cidr)?;
        let rules = PolicyService::new(self.state.clone()).rules_for_block(block).await?;

        Ok(UsableAddresses::new(
            network,
            self.state.settings.exclude_network_and_broadcast,
            rules,
        ))
    }

    /// 分配 IP 地址
    ///
    /// 指定 `address` 时分配该地址，否则由地址生成器挑选（默认按地址升序）。
    pub async fn allocate_ip(
        &self,
        block_id: i64,
        address: Option<&str>,
        used_by: Option<String>,
    ) -> Result<IpAddress> {
        let blocks = IpBlockService::new(self.state.clone());
        let block = blocks.get_block(block_id).await?;
        let usable = self.usable_addresses(&block).await?;

        let _guard = self.state.block_locks.acquire(block_id).await;
        // 等锁期间 block 可能已被删除
        blocks.get_block(block_id).await?;

        let now = Utc::now();
        let reusable_before = self.state.settings.reusable_before(now);

        let target = match address {
            Some(requested) => {
                let requested = parse_address(requested)?;
                if !usable.is_usable(requested) {
                    return Err(Error::AddressNotInBlock(format!(
                        "{} 不属于 IpBlock {} ({})",
                        requested, block.id, block.cidr
                    )));
                }
                requested
            }
            None => {
                let unavailable: HashSet<u32> = self
                    .state
                    .store
                    .unavailable_addresses(block_id, reusable_before)
                    .await?
                    .into_iter()
                    .collect();
                debug!("IpBlock {} 中已占用 {} 个地址", block_id, unavailable.len());

                let generator = &self.state.ip_generator;
                let candidate = generator
                    .next_address(&usable, &unavailable)
                    .ok_or_else(|| Error::IpBlockFull(format!("IpBlock {} ({})", block.id, block.cidr)))?;

                if !usable.is_usable(candidate) || unavailable.contains(&u32::from(candidate)) {
                    return Err(Error::Internal(format!(
                        "地址生成器 {} 返回了不可用地址 {}",
                        generator.name(),
                        candidate
                    )));
                }
                candidate
            }
        };

        let ip = self
            .state
            .store
            .claim_address(ClaimAddress {
                ip_block_id: block_id,
                address: target.to_string(),
                address_value: u32::from(target) as i64,
                used_by,
                allocated_at: now.into(),
                reusable_before,
            })
            .await?;

        info!("IpBlock {} 分配地址 {} (used_by={:?})", block_id, ip.address, ip.used_by);
        Ok(ip)
    }

    /// 获取 block 内的单个地址
    pub async fn get_ip(&self, block_id: i64, address: &str) -> Result<IpAddress> {
        IpBlockService::new(self.state.clone()).get_block(block_id).await?;
        let address = canonical_address(address)?;

        self.state
            .store
            .find_address(block_id, &address)
            .await?
            .ok_or_else(|| Error::IpAddressNotFound(format!("{} (block {})", address, block_id)))
    }

    /// 列出 block 内的地址（按地址升序）
    pub async fn list_ips(&self, block_id: i64, page: &PageRequest) -> Result<Page<IpAddress>> {
        IpBlockService::new(self.state.clone()).get_block(block_id).await?;

        self.state
            .store
            .list_addresses_in_block(block_id, page, self.state.settings.max_page_limit)
            .await
    }
}
