/// 引擎全局状态

use chrono::{DateTime, Duration, Utc};
use common::pagination::DEFAULT_MAX_LIMIT;
use sea_orm::prelude::DateTimeWithTimeZone;
use std::sync::Arc;

use crate::services::block_locks::BlockLocks;
use crate::services::ip_generator::{IpGenerator, LowestAvailable};
use crate::store::IpamStore;

/// 默认隔离期：2 天
pub const DEFAULT_QUARANTINE_SECS: u64 = 2 * 24 * 60 * 60;

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct IpamSettings {
    /// 地址释放后到可被重新分配之间的隔离期
    pub quarantine: Duration,
    /// 是否排除网络地址和广播地址（仅对 /30 及更大的网络生效）
    pub exclude_network_and_broadcast: bool,
    /// 分页大小上限，未指定 limit 时使用
    pub max_page_limit: u64,
}

impl Default for IpamSettings {
    fn default() -> Self {
        Self {
            quarantine: Duration::seconds(DEFAULT_QUARANTINE_SECS as i64),
            exclude_network_and_broadcast: false,
            max_page_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl IpamSettings {
    /// 早于该时间被标记释放的地址已过隔离期
    pub fn reusable_before(&self, now: DateTime<Utc>) -> DateTimeWithTimeZone {
        (now - self.quarantine).into()
    }
}

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 存储后端
    pub store: Arc<dyn IpamStore>,
    /// 运行参数
    pub settings: IpamSettings,
    /// 按 block 串行化分配
    pub block_locks: BlockLocks,
    /// 隐式分配使用的地址生成器
    pub ip_generator: Arc<dyn IpGenerator>,
}

impl AppState {
    pub fn new(store: Arc<dyn IpamStore>, settings: IpamSettings) -> Self {
        Self {
            store,
            settings,
            block_locks: BlockLocks::new(),
            ip_generator: Arc::new(LowestAvailable),
        }
    }

    /// 替换地址生成器
    pub fn with_ip_generator(mut self, ip_generator: Arc<dyn IpGenerator>) -> Self {
        self.ip_generator = ip_generator;
        self
    }
}
