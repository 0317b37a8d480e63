/// 地址生成器
///
/// 隐式分配时由生成器从 block 的可用地址中挑选下一个地址。
/// 生成器按名称从配置中选择，也可以直接注入 `AppState`。

use common::utils::address_range;
use common::{Error, PolicyRules, Result};
use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// 默认生成器名称
pub const DEFAULT_IP_GENERATOR: &str = LowestAvailable::NAME;

/// block 内可分配地址的判定
pub struct UsableAddresses {
    network: Ipv4Network,
    first: u32,
    last: u32,
    exclude_edges: bool,
    rules: PolicyRules,
}

impl UsableAddresses {
    pub fn new(network: Ipv4Network, exclude_network_and_broadcast: bool, rules: PolicyRules) -> Self {
        let (first, last) = address_range(&network);
        Self {
            network,
            first,
            last,
            // /31 和 /32 没有独立的网络地址和广播地址
            exclude_edges: exclude_network_and_broadcast && network.prefix() <= 30,
            rules,
        }
    }

    pub fn is_usable(&self, address: Ipv4Addr) -> bool {
        let value = u32::from(address);
        if value < self.first || value > self.last {
            return false;
        }
        if self.exclude_edges && (value == self.first || value == self.last) {
            return false;
        }
        !self.rules.excludes(&self.network, address)
    }

    /// 按地址升序遍历所有可用地址
    pub fn candidates(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> + '_ {
        (self.first..=self.last)
            .map(Ipv4Addr::from)
            .filter(move |address| self.is_usable(*address))
    }

    /// 按地址升序找到第一个可用且未被占用的地址
    pub fn first_available(&self, unavailable: &HashSet<u32>) -> Option<Ipv4Addr> {
        self.candidates()
            .find(|address| !unavailable.contains(&u32::from(*address)))
    }
}

/// 地址生成器
pub trait IpGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// 挑选下一个待分配地址，`unavailable` 为已占用或仍在隔离期的地址
    fn next_address(&self, usable: &UsableAddresses, unavailable: &HashSet<u32>) -> Option<Ipv4Addr>;
}

/// 按地址升序分配第一个可用地址
#[derive(Debug, Default, Clone, Copy)]
pub struct LowestAvailable;

impl LowestAvailable {
    pub const NAME: &'static str = "lowest_available";
}

impl IpGenerator for LowestAvailable {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn next_address(&self, usable: &UsableAddresses, unavailable: &HashSet<u32>) -> Option<Ipv4Addr> {
        usable.first_available(unavailable)
    }
}

/// 按名称选择内置生成器
pub fn ip_generator_by_name(name: &str) -> Result<Arc<dyn IpGenerator>> {
    match name.trim() {
        LowestAvailable::NAME => Ok(Arc::new(LowestAvailable)),
        other => Err(Error::Config(format!("未知的地址生成器: {}", other))),
    }
}
