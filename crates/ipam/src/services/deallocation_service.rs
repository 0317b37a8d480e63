/// 地址释放与恢复服务
///
/// 释放只做标记，地址在隔离期内不会被重新分配；
/// 隔离期过后由定期清理任务删除。

use chrono::Utc;
use common::utils::canonical_address;
use common::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::db::models::IpAddress;
use crate::services::IpBlockService;

pub struct DeallocationService {
    state: AppState,
}

impl DeallocationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 标记地址待释放
    pub async fn deallocate_ip(&self, block_id: i64, address: &str) -> Result<IpAddress> {
        IpBlockService::new(self.state.clone()).get_block(block_id).await?;
        let address = canonical_address(address)?;

        let ip = self
            .state
            .store
            .mark_for_deallocation(block_id, &address, Utc::now().into())
            .await?;

        info!("IpBlock {} 地址 {} 已标记释放", block_id, address);
        Ok(ip)
    }

    /// 恢复被标记释放的地址
    pub async fn restore_ip(&self, block_id: i64, address: &str) -> Result<IpAddress> {
        IpBlockService::new(self.state.clone()).get_block(block_id).await?;
        let address = canonical_address(address)?;

        let ip = self.state.store.restore_address(block_id, &address).await?;

        info!("IpBlock {} 地址 {} 已恢复", block_id, address);
        Ok(ip)
    }

    /// 删除隔离期已过的地址
    pub async fn purge_expired(&self) -> Result<u64> {
        let reusable_before = self.state.settings.reusable_before(Utc::now());
        let purged = self.state.store.purge_deallocated(reusable_before).await?;

        if purged > 0 {
            info!("已清理 {} 个隔离期已过的地址", purged);
        }
        Ok(purged)
    }

    /// 启动定期清理任务
    pub fn start_purge_sweeper(self, interval_secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

            loop {
                interval.tick().await;

                if let Err(e) = self.purge_expired().await {
                    error!("地址清理: 执行失败: {}", e);
                }
            }
        })
    }
}
