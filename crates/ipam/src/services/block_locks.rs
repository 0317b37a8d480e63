/// 按 block 的分配锁
///
/// 同一 block 的"扫描并占用"必须串行执行；不同 block 互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct BlockLocks {
    locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl BlockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取 block 的独占锁，guard 释放前其他分配请求等待
    pub async fn acquire(&self, block_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(block_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// block 删除后移除其锁
    pub async fn forget(&self, block_id: i64) {
        self.locks.lock().await.remove(&block_id);
    }

    #[cfg(test)]
    pub async fn tracked_blocks(&self) -> usize {
        self.locks.lock().await.len()
    }
}
