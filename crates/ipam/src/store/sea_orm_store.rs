/// SeaORM 存储实现（PostgreSQL）

use async_trait::async_trait;
use common::pagination::{ById, Identified, Start};
use common::{Error, IpBlockType, Page, PageRequest, Result};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
    TransactionTrait,
};
use tracing::debug;

use super::IpamStore;
use crate::db::models::ip_address::{self, ByAddressValue, ClaimAddress};
use crate::db::models::ip_block::{self, NewIpBlock};
use crate::db::models::ip_nat_relation::{self, NatDirection};
use crate::db::models::policy::{self, NewPolicy};
use crate::db::models::{IpAddress, IpBlock, Policy};
use crate::db::{is_unique_violation, DbResultExt};

pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// 按排序键取一页，多取一条用于判断是否还有后续
async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    key: E::Column,
    start: Start<i64>,
    limit: u64,
) -> Result<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: Identified,
    C: ConnectionTrait,
{
    if limit == 0 {
        return Ok(Page::empty());
    }

    let select = match start {
        Start::Exhausted => return Ok(Page::empty()),
        Start::Beginning => select,
        Start::After(after) => select.filter(key.gt(after)),
    };

    let rows = select
        .order_by_asc(key)
        .limit(limit + 1)
        .all(db)
        .await
        .db()?;

    Ok(Page::from_overfetch(rows, limit))
}

/// (查询端列, 对端列)
fn nat_columns(direction: NatDirection) -> (ip_nat_relation::Column, ip_nat_relation::Column) {
    match direction {
        NatDirection::InsideGlobals => (
            ip_nat_relation::Column::InsideLocalAddressId,
            ip_nat_relation::Column::InsideGlobalAddressId,
        ),
        NatDirection::InsideLocals => (
            ip_nat_relation::Column::InsideGlobalAddressId,
            ip_nat_relation::Column::InsideLocalAddressId,
        ),
    }
}

fn address_not_found(block_id: i64, address: &str) -> Error {
    Error::IpAddressNotFound(format!("{} (block {})", address, block_id))
}

fn find_in_block(block_id: i64, address: &str) -> Select<ip_address::Entity> {
    ip_address::Entity::find()
        .filter(ip_address::Column::IpBlockId.eq(block_id))
        .filter(ip_address::Column::Address.eq(address))
}

/// 隔离期已过的地址
fn reusable_condition(reusable_before: DateTimeWithTimeZone) -> Condition {
    Condition::all()
        .add(ip_address::Column::MarkedForDeallocation.eq(true))
        .add(ip_address::Column::DeallocatedAt.lte(reusable_before))
}

/// 引用该地址的所有 NAT 关联
fn nat_of(address_ids: Vec<i64>) -> Condition {
    Condition::any()
        .add(ip_nat_relation::Column::InsideLocalAddressId.is_in(address_ids.clone()))
        .add(ip_nat_relation::Column::InsideGlobalAddressId.is_in(address_ids))
}

#[async_trait]
impl IpamStore for SeaOrmStore {
    async fn insert_policy(&self, policy: NewPolicy) -> Result<Policy> {
        let policy_active = policy::ActiveModel {
            name: Set(policy.name),
            description: Set(policy.description),
            unusable_ip_ranges: Set(policy.unusable_ip_ranges),
            unusable_ip_octets: Set(policy.unusable_ip_octets),
            created_at: Set(policy.created_at),
            ..Default::default()
        };

        policy_active.insert(&self.db).await.db()
    }

    async fn find_policy(&self, id: i64) -> Result<Option<Policy>> {
        policy::Entity::find_by_id(id).one(&self.db).await.db()
    }

    async fn insert_block(&self, block: NewIpBlock) -> Result<IpBlock> {
        let public_cidr = (block.block_type == IpBlockType::Public).then(|| block.cidr.clone());

        let block_active = ip_block::ActiveModel {
            network_id: Set(block.network_id),
            cidr: Set(block.cidr.clone()),
            block_type: Set(block.block_type.as_str().to_string()),
            public_cidr: Set(public_cidr),
            policy_id: Set(block.policy_id),
            created_at: Set(block.created_at),
            updated_at: Set(block.created_at),
            ..Default::default()
        };

        match block_active.insert(&self.db).await {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicatePublicCidr(block.cidr)),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    async fn find_block(&self, id: i64) -> Result<Option<IpBlock>> {
        ip_block::Entity::find_by_id(id).one(&self.db).await.db()
    }

    async fn find_public_block_by_cidr(&self, cidr: &str) -> Result<Option<IpBlock>> {
        ip_block::Entity::find()
            .filter(ip_block::Column::PublicCidr.eq(cidr))
            .one(&self.db)
            .await
            .db()
    }

    async fn find_blocks_by_network_id(&self, network_id: &str) -> Result<Vec<IpBlock>> {
        ip_block::Entity::find()
            .filter(ip_block::Column::NetworkId.eq(network_id))
            .order_by_asc(ip_block::Column::Id)
            .all(&self.db)
            .await
            .db()
    }

    async fn list_blocks(&self, page: &PageRequest, max_limit: u64) -> Result<Page<IpBlock>> {
        let start = page.start::<IpBlock, ById>(None);
        fetch_page(
            &self.db,
            ip_block::Entity::find(),
            ip_block::Column::Id,
            start,
            page.effective_limit(max_limit),
        )
        .await
    }

    async fn delete_block(&self, id: i64) -> Result<()> {
        let txn = self.db.begin().await.db()?;

        ip_block::Entity::find_by_id(id)
            .one(&txn)
            .await
            .db()?
            .ok_or_else(|| Error::IpBlockNotFound(id.to_string()))?;

        let in_use = ip_address::Entity::find()
            .filter(ip_address::Column::IpBlockId.eq(id))
            .count(&txn)
            .await
            .db()?;
        if in_use > 0 {
            return Err(Error::IpBlockInUse(format!("block {} 仍有 {} 条地址记录", id, in_use)));
        }

        ip_block::Entity::delete_by_id(id).exec(&txn).await.db()?;
        txn.commit().await.db()
    }

    async fn find_address(&self, block_id: i64, address: &str) -> Result<Option<IpAddress>> {
        find_in_block(block_id, address).one(&self.db).await.db()
    }

    async fn list_addresses_in_block(
        &self,
        block_id: i64,
        page: &PageRequest,
        max_limit: u64,
    ) -> Result<Page<IpAddress>> {
        let marker_item = match page.marker {
            Some(marker) => ip_address::Entity::find_by_id(marker)
                .filter(ip_address::Column::IpBlockId.eq(block_id))
                .one(&self.db)
                .await
                .db()?,
            None => None,
        };
        let start = page.start::<IpAddress, ByAddressValue>(marker_item.as_ref());

        fetch_page(
            &self.db,
            ip_address::Entity::find().filter(ip_address::Column::IpBlockId.eq(block_id)),
            ip_address::Column::AddressValue,
            start,
            page.effective_limit(max_limit),
        )
        .await
    }

    async fn unavailable_addresses(
        &self,
        block_id: i64,
        reusable_before: DateTimeWithTimeZone,
    ) -> Result<Vec<u32>> {
        let values: Vec<i64> = ip_address::Entity::find()
            .select_only()
            .column(ip_address::Column::AddressValue)
            .filter(ip_address::Column::IpBlockId.eq(block_id))
            .filter(reusable_condition(reusable_before).not())
            .into_tuple()
            .all(&self.db)
            .await
            .db()?;

        Ok(values.into_iter().map(|v| v as u32).collect())
    }

    async fn claim_address(&self, claim: ClaimAddress) -> Result<IpAddress> {
        let txn = self.db.begin().await.db()?;

        ip_block::Entity::find_by_id(claim.ip_block_id)
            .one(&txn)
            .await
            .db()?
            .ok_or_else(|| Error::IpBlockNotFound(claim.ip_block_id.to_string()))?;

        let existing = find_in_block(claim.ip_block_id, &claim.address)
            .one(&txn)
            .await
            .db()?;

        let claimed = match existing {
            None => {
                let ip_active = ip_address::ActiveModel {
                    ip_block_id: Set(claim.ip_block_id),
                    address: Set(claim.address.clone()),
                    address_value: Set(claim.address_value),
                    used_by: Set(claim.used_by),
                    marked_for_deallocation: Set(false),
                    allocated_at: Set(claim.allocated_at),
                    deallocated_at: Set(None),
                    created_at: Set(claim.allocated_at),
                    ..Default::default()
                };

                match ip_active.insert(&txn).await {
                    Ok(model) => model,
                    Err(e) if is_unique_violation(&e) => {
                        return Err(Error::AddressAlreadyAllocated(claim.address));
                    }
                    Err(e) => return Err(Error::Database(e.to_string())),
                }
            }
            Some(ip) if ip.is_reusable(claim.reusable_before) => {
                // 条件更新，防止并发复用同一条记录
                let updated = ip_address::Entity::update_many()
                    .col_expr(ip_address::Column::UsedBy, Expr::value(claim.used_by))
                    .col_expr(ip_address::Column::MarkedForDeallocation, Expr::value(false))
                    .col_expr(ip_address::Column::AllocatedAt, Expr::value(claim.allocated_at))
                    .col_expr(
                        ip_address::Column::DeallocatedAt,
                        Expr::value(Option::<DateTimeWithTimeZone>::None),
                    )
                    .filter(ip_address::Column::Id.eq(ip.id))
                    .filter(reusable_condition(claim.reusable_before))
                    .exec(&txn)
                    .await
                    .db()?;
                if updated.rows_affected == 0 {
                    return Err(Error::AddressAlreadyAllocated(claim.address));
                }

                let removed = ip_nat_relation::Entity::delete_many()
                    .filter(nat_of(vec![ip.id]))
                    .exec(&txn)
                    .await
                    .db()?;
                if removed.rows_affected > 0 {
                    debug!("复用地址 {} 时清除了 {} 条 NAT 关联", claim.address, removed.rows_affected);
                }

                ip_address::Entity::find_by_id(ip.id)
                    .one(&txn)
                    .await
                    .db()?
                    .ok_or_else(|| Error::Internal(format!("地址记录 {} 丢失", ip.id)))?
            }
            Some(_) => return Err(Error::AddressAlreadyAllocated(claim.address)),
        };

        txn.commit().await.db()?;
        Ok(claimed)
    }

    async fn mark_for_deallocation(
        &self,
        block_id: i64,
        address: &str,
        at: DateTimeWithTimeZone,
    ) -> Result<IpAddress> {
        let txn = self.db.begin().await.db()?;

        let ip = find_in_block(block_id, address)
            .one(&txn)
            .await
            .db()?
            .ok_or_else(|| address_not_found(block_id, address))?;

        let ip = if ip.marked_for_deallocation {
            ip
        } else {
            let mut ip_active: ip_address::ActiveModel = ip.into();
            ip_active.marked_for_deallocation = Set(true);
            ip_active.deallocated_at = Set(Some(at));
            ip_active.update(&txn).await.db()?
        };

        txn.commit().await.db()?;
        Ok(ip)
    }

    async fn restore_address(&self, block_id: i64, address: &str) -> Result<IpAddress> {
        let txn = self.db.begin().await.db()?;

        let ip = find_in_block(block_id, address)
            .one(&txn)
            .await
            .db()?
            .ok_or_else(|| address_not_found(block_id, address))?;

        let mut ip_active: ip_address::ActiveModel = ip.into();
        ip_active.marked_for_deallocation = Set(false);
        ip_active.deallocated_at = Set(None);
        let restored = ip_active.update(&txn).await.db()?;

        txn.commit().await.db()?;
        Ok(restored)
    }

    async fn purge_deallocated(&self, reusable_before: DateTimeWithTimeZone) -> Result<u64> {
        let txn = self.db.begin().await.db()?;

        let expired: Vec<i64> = ip_address::Entity::find()
            .select_only()
            .column(ip_address::Column::Id)
            .filter(reusable_condition(reusable_before))
            .into_tuple()
            .all(&txn)
            .await
            .db()?;

        if expired.is_empty() {
            txn.commit().await.db()?;
            return Ok(0);
        }

        ip_nat_relation::Entity::delete_many()
            .filter(nat_of(expired.clone()))
            .exec(&txn)
            .await
            .db()?;

        let purged = ip_address::Entity::delete_many()
            .filter(ip_address::Column::Id.is_in(expired))
            .exec(&txn)
            .await
            .db()?;

        txn.commit().await.db()?;
        Ok(purged.rows_affected)
    }

    async fn insert_nat_relations(
        &self,
        pairs: &[(i64, i64)],
        created_at: DateTimeWithTimeZone,
    ) -> Result<u64> {
        let txn = self.db.begin().await.db()?;
        let mut inserted = 0;

        for &(local_id, global_id) in pairs {
            let relation_active = ip_nat_relation::ActiveModel {
                inside_local_address_id: Set(local_id),
                inside_global_address_id: Set(global_id),
                created_at: Set(created_at),
                ..Default::default()
            };

            inserted += ip_nat_relation::Entity::insert(relation_active)
                .on_conflict(
                    OnConflict::columns([
                        ip_nat_relation::Column::InsideLocalAddressId,
                        ip_nat_relation::Column::InsideGlobalAddressId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .db()?;
        }

        txn.commit().await.db()?;
        Ok(inserted)
    }

    async fn list_nat_counterparts(
        &self,
        address_id: i64,
        direction: NatDirection,
        page: &PageRequest,
        max_limit: u64,
    ) -> Result<Page<IpAddress>> {
        let (owner_column, _) = nat_columns(direction);
        let counterpart = match direction {
            NatDirection::InsideGlobals => ip_nat_relation::Relation::InsideGlobal,
            NatDirection::InsideLocals => ip_nat_relation::Relation::InsideLocal,
        };

        let select = ip_address::Entity::find()
            .join(JoinType::InnerJoin, counterpart.def().rev())
            .filter(owner_column.eq(address_id));
        let start = page.start::<IpAddress, ById>(None);

        fetch_page(
            &self.db,
            select,
            ip_address::Column::Id,
            start,
            page.effective_limit(max_limit),
        )
        .await
    }

    async fn delete_nat_relations(
        &self,
        address_id: i64,
        direction: NatDirection,
        counterpart_id: Option<i64>,
    ) -> Result<u64> {
        let (owner_column, counterpart_column) = nat_columns(direction);

        let mut delete = ip_nat_relation::Entity::delete_many().filter(owner_column.eq(address_id));
        if let Some(id) = counterpart_id {
            delete = delete.filter(counterpart_column.eq(id));
        }

        let result = delete.exec(&self.db).await.db()?;
        Ok(result.rows_affected)
    }
}
