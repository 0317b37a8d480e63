/// 地址策略规则

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::errors::{Error, Result};

/// 不可用地址区间，offset 相对于 block 的网络地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusableRange {
    pub offset: u32,
    pub length: u32,
}

impl UnusableRange {
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    fn contains(&self, offset: u32) -> bool {
        let start = self.offset as u64;
        let end = start + self.length as u64;
        (start..end).contains(&(offset as u64))
    }
}

/// 策略规则集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default)]
    pub unusable_ranges: Vec<UnusableRange>,
    /// 末位八位组命中即不可用
    #[serde(default)]
    pub unusable_octets: Vec<u8>,
}

impl PolicyRules {
    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.unusable_ranges.iter().find(|r| r.length == 0) {
            return Err(Error::InvalidArgument(format!(
                "不可用区间长度必须大于 0 (offset={})",
                range.offset
            )));
        }
        Ok(())
    }

    /// 地址是否被策略排除（调用方保证地址位于网络内）
    pub fn excludes(&self, network: &Ipv4Network, address: Ipv4Addr) -> bool {
        let offset = u32::from(address).wrapping_sub(u32::from(network.network()));

        self.unusable_ranges.iter().any(|r| r.contains(offset))
            || self.unusable_octets.contains(&address.octets()[3])
    }
}
