/// 内存存储实现
///
/// 所有表由同一把读写锁保护，每个方法即一次事务。用于嵌入式部署和测试。

use async_trait::async_trait;
use common::pagination::{paginate, ById};
use common::{Error, IpBlockType, Page, PageRequest, Result};
use sea_orm::prelude::DateTimeWithTimeZone;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::IpamStore;
use crate::db::models::ip_address::{ByAddressValue, ClaimAddress};
use crate::db::models::ip_block::NewIpBlock;
use crate::db::models::ip_nat_relation::NatDirection;
use crate::db::models::policy::NewPolicy;
use crate::db::models::{IpAddress, IpBlock, IpNatRelation, Policy};

#[derive(Default)]
struct Tables {
    policy_seq: i64,
    block_seq: i64,
    address_seq: i64,
    nat_seq: i64,
    policies: BTreeMap<i64, Policy>,
    blocks: BTreeMap<i64, IpBlock>,
    addresses: BTreeMap<i64, IpAddress>,
    nat_relations: BTreeMap<i64, IpNatRelation>,
}

impl Tables {
    fn find_address_mut(&mut self, block_id: i64, address: &str) -> Option<&mut IpAddress> {
        self.addresses
            .values_mut()
            .find(|ip| ip.ip_block_id == block_id && ip.address == address)
    }

    fn remove_nat_relations_of(&mut self, address_id: i64) -> usize {
        let before = self.nat_relations.len();
        self.nat_relations.retain(|_, rel| {
            rel.inside_local_address_id != address_id && rel.inside_global_address_id != address_id
        });
        before - self.nat_relations.len()
    }
}

/// 内存存储
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn address_not_found(block_id: i64, address: &str) -> Error {
    Error::IpAddressNotFound(format!("{} (block {})", address, block_id))
}

#[async_trait]
impl IpamStore for MemoryStore {
    async fn insert_policy(&self, policy: NewPolicy) -> Result<Policy> {
        let mut tables = self.tables.write().await;
        tables.policy_seq += 1;

        let model = Policy {
            id: tables.policy_seq,
            name: policy.name,
            description: policy.description,
            unusable_ip_ranges: policy.unusable_ip_ranges,
            unusable_ip_octets: policy.unusable_ip_octets,
            created_at: policy.created_at,
        };
        tables.policies.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_policy(&self, id: i64) -> Result<Option<Policy>> {
        Ok(self.tables.read().await.policies.get(&id).cloned())
    }

    async fn insert_block(&self, block: NewIpBlock) -> Result<IpBlock> {
        let mut tables = self.tables.write().await;

        let public_cidr = (block.block_type == IpBlockType::Public).then(|| block.cidr.clone());
        if let Some(ref cidr) = public_cidr {
            if tables.blocks.values().any(|b| b.public_cidr.as_ref() == Some(cidr)) {
                return Err(Error::DuplicatePublicCidr(cidr.clone()));
            }
        }

        tables.block_seq += 1;
        let model = IpBlock {
            id: tables.block_seq,
            network_id: block.network_id,
            cidr: block.cidr,
            block_type: block.block_type.as_str().to_string(),
            public_cidr,
            policy_id: block.policy_id,
            created_at: block.created_at,
            updated_at: block.created_at,
        };
        tables.blocks.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_block(&self, id: i64) -> Result<Option<IpBlock>> {
        Ok(self.tables.read().await.blocks.get(&id).cloned())
    }

    async fn find_public_block_by_cidr(&self, cidr: &str) -> Result<Option<IpBlock>> {
        let tables = self.tables.read().await;
        Ok(tables
            .blocks
            .values()
            .find(|b| b.public_cidr.as_deref() == Some(cidr))
            .cloned())
    }

    async fn find_blocks_by_network_id(&self, network_id: &str) -> Result<Vec<IpBlock>> {
        let tables = self.tables.read().await;
        Ok(tables
            .blocks
            .values()
            .filter(|b| b.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn list_blocks(&self, page: &PageRequest, max_limit: u64) -> Result<Page<IpBlock>> {
        let tables = self.tables.read().await;
        Ok(paginate::<_, ById>(tables.blocks.values().cloned(), page, max_limit))
    }

    async fn delete_block(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;

        if !tables.blocks.contains_key(&id) {
            return Err(Error::IpBlockNotFound(id.to_string()));
        }

        let in_use = tables.addresses.values().filter(|ip| ip.ip_block_id == id).count();
        if in_use > 0 {
            return Err(Error::IpBlockInUse(format!("block {} 仍有 {} 条地址记录", id, in_use)));
        }

        tables.blocks.remove(&id);
        Ok(())
    }

    async fn find_address(&self, block_id: i64, address: &str) -> Result<Option<IpAddress>> {
        let tables = self.tables.read().await;
        Ok(tables
            .addresses
            .values()
            .find(|ip| ip.ip_block_id == block_id && ip.address == address)
            .cloned())
    }

    async fn list_addresses_in_block(
        &self,
        block_id: i64,
        page: &PageRequest,
        max_limit: u64,
    ) -> Result<Page<IpAddress>> {
        let tables = self.tables.read().await;
        let in_block = tables
            .addresses
            .values()
            .filter(|ip| ip.ip_block_id == block_id)
            .cloned();
        Ok(paginate::<_, ByAddressValue>(in_block, page, max_limit))
    }

    async fn unavailable_addresses(
        &self,
        block_id: i64,
        reusable_before: DateTimeWithTimeZone,
    ) -> Result<Vec<u32>> {
        let tables = self.tables.read().await;
        Ok(tables
            .addresses
            .values()
            .filter(|ip| ip.ip_block_id == block_id && !ip.is_reusable(reusable_before))
            .map(|ip| ip.address_value as u32)
            .collect())
    }

    async fn claim_address(&self, claim: ClaimAddress) -> Result<IpAddress> {
        let mut tables = self.tables.write().await;

        if !tables.blocks.contains_key(&claim.ip_block_id) {
            return Err(Error::IpBlockNotFound(claim.ip_block_id.to_string()));
        }

        let existing = tables
            .find_address_mut(claim.ip_block_id, &claim.address)
            .map(|ip| (ip.id, ip.is_reusable(claim.reusable_before)));

        match existing {
            None => {
                tables.address_seq += 1;
                let model = IpAddress {
                    id: tables.address_seq,
                    ip_block_id: claim.ip_block_id,
                    address: claim.address,
                    address_value: claim.address_value,
                    used_by: claim.used_by,
                    marked_for_deallocation: false,
                    allocated_at: claim.allocated_at,
                    deallocated_at: None,
                    created_at: claim.allocated_at,
                };
                tables.addresses.insert(model.id, model.clone());
                Ok(model)
            }
            Some((id, true)) => {
                let removed = tables.remove_nat_relations_of(id);
                if removed > 0 {
                    debug!("复用地址 {} 时清除了 {} 条 NAT 关联", claim.address, removed);
                }

                let ip = tables
                    .addresses
                    .get_mut(&id)
                    .ok_or_else(|| Error::Internal(format!("地址记录 {} 丢失", id)))?;
                ip.used_by = claim.used_by;
                ip.marked_for_deallocation = false;
                ip.allocated_at = claim.allocated_at;
                ip.deallocated_at = None;
                Ok(ip.clone())
            }
            Some((_, false)) => Err(Error::AddressAlreadyAllocated(claim.address)),
        }
    }

    async fn mark_for_deallocation(
        &self,
        block_id: i64,
        address: &str,
        at: DateTimeWithTimeZone,
    ) -> Result<IpAddress> {
        let mut tables = self.tables.write().await;
        let ip = tables
            .find_address_mut(block_id, address)
            .ok_or_else(|| address_not_found(block_id, address))?;

        if !ip.marked_for_deallocation {
            ip.marked_for_deallocation = true;
            ip.deallocated_at = Some(at);
        }
        Ok(ip.clone())
    }

    async fn restore_address(&self, block_id: i64, address: &str) -> Result<IpAddress> {
        let mut tables = self.tables.write().await;
        let ip = tables
            .find_address_mut(block_id, address)
            .ok_or_else(|| address_not_found(block_id, address))?;

        ip.marked_for_deallocation = false;
        ip.deallocated_at = None;
        Ok(ip.clone())
    }

    async fn purge_deallocated(&self, reusable_before: DateTimeWithTimeZone) -> Result<u64> {
        let mut tables = self.tables.write().await;

        let expired: Vec<i64> = tables
            .addresses
            .values()
            .filter(|ip| ip.is_reusable(reusable_before))
            .map(|ip| ip.id)
            .collect();

        for id in expired.iter() {
            tables.remove_nat_relations_of(*id);
            tables.addresses.remove(id);
        }
        Ok(expired.len() as u64)
    }

    async fn insert_nat_relations(
        &self,
        pairs: &[(i64, i64)],
        created_at: DateTimeWithTimeZone,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut inserted = 0;

        for &(local_id, global_id) in pairs {
            let exists = tables.nat_relations.values().any(|rel| {
                rel.inside_local_address_id == local_id && rel.inside_global_address_id == global_id
            });
            if exists {
                continue;
            }

            tables.nat_seq += 1;
            let relation = IpNatRelation {
                id: tables.nat_seq,
                inside_local_address_id: local_id,
                inside_global_address_id: global_id,
                created_at,
            };
            tables.nat_relations.insert(relation.id, relation);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list_nat_counterparts(
        &self,
        address_id: i64,
        direction: NatDirection,
        page: &PageRequest,
        max_limit: u64,
    ) -> Result<Page<IpAddress>> {
        let tables = self.tables.read().await;
        let counterparts = tables
            .nat_relations
            .values()
            .filter(|rel| direction.owned_by(rel, address_id))
            .filter_map(|rel| tables.addresses.get(&direction.counterpart_of(rel)))
            .cloned();
        Ok(paginate::<_, ById>(counterparts, page, max_limit))
    }

    async fn delete_nat_relations(
        &self,
        address_id: i64,
        direction: NatDirection,
        counterpart_id: Option<i64>,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.nat_relations.len();

        tables.nat_relations.retain(|_, rel| {
            let matches = direction.owned_by(rel, address_id)
                && counterpart_id.map_or(true, |id| direction.counterpart_of(rel) == id);
            !matches
        });
        Ok((before - tables.nat_relations.len()) as u64)
    }
}
