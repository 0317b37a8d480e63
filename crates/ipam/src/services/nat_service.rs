/// NAT 关联服务
///
/// 维护 inside local 与 inside global 地址之间的多对多关联。
/// 关联只影响关联表，不修改或删除两端的地址记录。

use chrono::Utc;
use common::utils::canonical_address;
use common::{AddressRef, Error, Page, PageRequest, Result};
use futures::future::try_join_all;
use tracing::info;

use crate::app_state::AppState;
use crate::db::models::ip_nat_relation::NatDirection;
use crate::db::models::IpAddress;
use crate::services::IpBlockService;

pub struct NatService {
    state: AppState,
}

impl NatService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 解析地址引用
    async fn resolve(&self, address: &AddressRef) -> Result<IpAddress> {
        IpBlockService::new(self.state.clone())
            .get_block(address.ip_block_id)
            .await?;

        let canonical = canonical_address(&address.address)?;

        self.state
            .store
            .find_address(address.ip_block_id, &canonical)
            .await?
            .ok_or_else(|| Error::IpAddressNotFound(address.to_string()))
    }

    async fn add(
        &self,
        address: &AddressRef,
        counterparts: &[AddressRef],
        direction: NatDirection,
    ) -> Result<()> {
        let ip = self.resolve(address).await?;
        let others = try_join_all(counterparts.iter().map(|other| self.resolve(other))).await?;

        let pairs: Vec<(i64, i64)> = others
            .iter()
            .map(|other| direction.pair(ip.id, other.id))
            .collect();
        let inserted = self
            .state
            .store
            .insert_nat_relations(&pairs, Utc::now().into())
            .await?;

        info!("地址 {} 新增 {} 条 {} 关联", address, inserted, direction.as_str());
        Ok(())
    }

    async fn list(
        &self,
        address: &AddressRef,
        direction: NatDirection,
        page: &PageRequest,
    ) -> Result<Page<IpAddress>> {
        let ip = self.resolve(address).await?;

        self.state
            .store
            .list_nat_counterparts(ip.id, direction, page, self.state.settings.max_page_limit)
            .await
    }

    async fn delete(
        &self,
        address: &AddressRef,
        counterpart: Option<&AddressRef>,
        direction: NatDirection,
    ) -> Result<()> {
        let ip = self.resolve(address).await?;
        let counterpart_id = match counterpart {
            Some(other) => Some(self.resolve(other).await?.id),
            None => None,
        };

        let deleted = self
            .state
            .store
            .delete_nat_relations(ip.id, direction, counterpart_id)
            .await?;

        info!("地址 {} 删除了 {} 条 {} 关联", address, deleted, direction.as_str());
        Ok(())
    }

    /// 为 inside local 地址添加 inside global 关联
    pub async fn add_inside_globals(&self, local: &AddressRef, globals: &[AddressRef]) -> Result<()> {
        self.add(local, globals, NatDirection::InsideGlobals).await
    }

    /// 为 inside global 地址添加 inside local 关联
    pub async fn add_inside_locals(&self, global: &AddressRef, locals: &[AddressRef]) -> Result<()> {
        self.add(global, locals, NatDirection::InsideLocals).await
    }

    /// 列出 inside local 地址的 inside globals（按 id 升序）
    pub async fn list_inside_globals(&self, local: &AddressRef, page: &PageRequest) -> Result<Page<IpAddress>> {
        self.list(local, NatDirection::InsideGlobals, page).await
    }

    /// 列出 inside global 地址的 inside locals（按 id 升序）
    pub async fn list_inside_locals(&self, global: &AddressRef, page: &PageRequest) -> Result<Page<IpAddress>> {
        self.list(global, NatDirection::InsideLocals, page).await
    }

    /// 删除 inside global 关联；指定 `global` 时只删除该对
    pub async fn delete_inside_globals(&self, local: &AddressRef, global: Option<&AddressRef>) -> Result<()> {
        self.delete(local, global, NatDirection::InsideGlobals).await
    }

    /// 删除 inside local 关联；指定 `local` 时只删除该对
    pub async fn delete_inside_locals(&self, global: &AddressRef, local: Option<&AddressRef>) -> Result<()> {
        self.delete(global, local, NatDirection::InsideLocals).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::services::{test_support, AllocationService};

    /// 在新建的 /32 block 中分配一个地址
    async fn allocate(state: &AppState, cidr: &str) -> AddressRef {
        let block = test_support::block(state, cidr).await;
        let ip = AllocationService::new(state.clone())
            .allocate_ip(block.id, None, None)
            .await
            .unwrap();
        AddressRef::new(block.id, ip.address)
    }

    fn addresses(page: &Page<IpAddress>) -> Vec<&str> {
        page.items.iter().map(|ip| ip.address.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_inside_local_nat() {
        let state = test_support::state();
        let global = allocate(&state, "169.1.1.1/32").await;
        let local_1 = allocate(&state, "10.1.1.1/32").await;
        let local_2 = allocate(&state, "10.0.0.1/32").await;
        let nat = NatService::new(state);

        nat.add_inside_locals(&global, &[local_1.clone(), local_2.clone()])
            .await
            .unwrap();

        let locals = nat.list_inside_locals(&global, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&locals), vec!["10.1.1.1", "10.0.0.1"]);

        let globals = nat.list_inside_globals(&local_1, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&globals), vec!["169.1.1.1"]);
    }

    #[tokio::test]
    async fn test_create_inside_global_nat_is_visible_both_ways() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let global = allocate(&state, "169.1.1.1/32").await;
        let nat = NatService::new(state);

        nat.add_inside_globals(&local, &[global.clone()]).await.unwrap();
        // 重复添加不报错
        nat.add_inside_globals(&local, &[global.clone()]).await.unwrap();

        let globals = nat.list_inside_globals(&local, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&globals), vec!["169.1.1.1"]);
        let locals = nat.list_inside_locals(&global, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&locals), vec!["10.1.1.1"]);
    }

    #[tokio::test]
    async fn test_add_with_missing_counterpart_inserts_nothing() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let global = allocate(&state, "169.1.1.1/32").await;
        let missing = AddressRef::new(global.ip_block_id, "169.1.1.2");
        let nat = NatService::new(state);

        let result = nat.add_inside_globals(&local, &[global, missing]).await;
        assert!(matches!(result, Err(Error::IpAddressNotFound(_))));

        let globals = nat.list_inside_globals(&local, &PageRequest::default()).await.unwrap();
        assert!(globals.items.is_empty());
    }

    #[tokio::test]
    async fn test_references_are_normalized() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let global = allocate(&state, "169.1.1.1/32").await;
        let nat = NatService::new(state);

        let padded_local = AddressRef::new(local.ip_block_id, " 10.1.1.1 ");
        let padded_global = AddressRef::new(global.ip_block_id, "169.1.1.1 ");
        nat.add_inside_globals(&padded_local, &[padded_global.clone()]).await.unwrap();

        let globals = nat.list_inside_globals(&local, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&globals), vec!["169.1.1.1"]);

        nat.delete_inside_locals(&padded_global, Some(&padded_local)).await.unwrap();
        let locals = nat.list_inside_locals(&global, &PageRequest::default()).await.unwrap();
        assert!(locals.items.is_empty());
    }

    #[tokio::test]
    async fn test_delete_inside_globals() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let global = allocate(&state, "169.1.1.1/32").await;
        let nat = NatService::new(state.clone());
        nat.add_inside_globals(&local, &[global.clone()]).await.unwrap();

        nat.delete_inside_globals(&local, None).await.unwrap();

        let globals = nat.list_inside_globals(&local, &PageRequest::default()).await.unwrap();
        assert!(globals.items.is_empty());

        // 两端地址保持不变
        let allocator = AllocationService::new(state);
        assert!(allocator.get_ip(local.ip_block_id, &local.address).await.is_ok());
        assert!(allocator.get_ip(global.ip_block_id, &global.address).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_inside_global_for_specific_address() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let g1 = allocate(&state, "169.1.1.1/32").await;
        let g2 = allocate(&state, "169.1.1.2/32").await;
        let g3 = allocate(&state, "169.1.1.3/32").await;
        let nat = NatService::new(state);
        nat.add_inside_globals(&local, &[g1, g2.clone(), g3]).await.unwrap();

        nat.delete_inside_globals(&local, Some(&g2)).await.unwrap();

        let globals = nat.list_inside_globals(&local, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&globals), vec!["169.1.1.1", "169.1.1.3"]);

        // 删除不存在的关联不是错误
        nat.delete_inside_globals(&local, Some(&g2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_inside_local_for_specific_address() {
        let state = test_support::state();
        let global = allocate(&state, "169.1.1.1/32").await;
        let l1 = allocate(&state, "10.1.1.1/32").await;
        let l2 = allocate(&state, "10.1.1.2/32").await;
        let l3 = allocate(&state, "10.1.1.3/32").await;
        let nat = NatService::new(state);
        nat.add_inside_locals(&global, &[l1, l2.clone(), l3]).await.unwrap();

        nat.delete_inside_locals(&global, Some(&l2)).await.unwrap();

        let locals = nat.list_inside_locals(&global, &PageRequest::default()).await.unwrap();
        assert_eq!(addresses(&locals), vec!["10.1.1.1", "10.1.1.3"]);
    }

    #[tokio::test]
    async fn test_delete_inside_locals() {
        let state = test_support::state();
        let global = allocate(&state, "169.1.1.1/32").await;
        let local = allocate(&state, "10.1.1.1/32").await;
        let nat = NatService::new(state);
        nat.add_inside_locals(&global, &[local.clone()]).await.unwrap();

        nat.delete_inside_locals(&global, None).await.unwrap();

        let locals = nat.list_inside_locals(&global, &PageRequest::default()).await.unwrap();
        assert!(locals.items.is_empty());
        let globals = nat.list_inside_globals(&local, &PageRequest::default()).await.unwrap();
        assert!(globals.items.is_empty());
    }

    #[tokio::test]
    async fn test_show_inside_globals_with_pagination() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let mut globals = Vec::new();
        for cidr in ["169.1.1.1/32", "169.1.1.2/32", "169.1.1.3/32", "169.1.1.4/32", "169.1.1.5/32"] {
            globals.push(allocate(&state, cidr).await);
        }
        let nat = NatService::new(state);
        nat.add_inside_globals(&local, &globals).await.unwrap();

        let first = nat.list_inside_globals(&local, &PageRequest::first(2)).await.unwrap();
        assert_eq!(addresses(&first), vec!["169.1.1.1", "169.1.1.2"]);

        let marker = first.next_marker.unwrap();
        let second = nat
            .list_inside_globals(&local, &PageRequest::after(marker, 2))
            .await
            .unwrap();
        assert_eq!(addresses(&second), vec!["169.1.1.3", "169.1.1.4"]);
    }

    #[tokio::test]
    async fn test_show_inside_locals_with_pagination() {
        let state = test_support::state();
        let global = allocate(&state, "169.1.1.1/32").await;
        let mut locals = Vec::new();
        for cidr in ["10.1.1.1/32", "10.1.1.2/32", "10.1.1.3/32", "10.1.1.4/32", "10.1.1.5/32"] {
            locals.push(allocate(&state, cidr).await);
        }
        let nat = NatService::new(state);
        nat.add_inside_locals(&global, &locals).await.unwrap();

        let mut seen = Vec::new();
        let mut page = PageRequest::first(2);
        loop {
            let result = nat.list_inside_locals(&global, &page).await.unwrap();
            seen.extend(addresses(&result).into_iter().map(str::to_string));
            match result.next_marker {
                Some(marker) => page = PageRequest::after(marker, 2),
                None => break,
            }
        }

        let expected: Vec<String> = locals.iter().map(|l| l.address.clone()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_nats_for_nonexistent_block_and_address() {
        let state = test_support::state();
        let local = allocate(&state, "10.1.1.1/32").await;
        let nat = NatService::new(state);

        let missing_block = AddressRef::new(1111111111, "10.1.1.1");
        assert!(matches!(
            nat.list_inside_globals(&missing_block, &PageRequest::default()).await,
            Err(Error::IpBlockNotFound(_))
        ));
        assert!(matches!(
            nat.delete_inside_locals(&missing_block, None).await,
            Err(Error::IpBlockNotFound(_))
        ));

        let missing_address = AddressRef::new(local.ip_block_id, "10.1.1.2");
        assert!(matches!(
            nat.list_inside_locals(&missing_address, &PageRequest::default()).await,
            Err(Error::IpAddressNotFound(_))
        ));
        assert!(matches!(
            nat.delete_inside_globals(&missing_address, None).await,
            Err(Error::IpAddressNotFound(_))
        ));
    }
}
