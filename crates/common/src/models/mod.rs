/// 共享数据模型
///
/// 定义引擎与服务层共享的类型

pub mod policy;

pub use policy::{PolicyRules, UnusableRange};

use serde::{Deserialize, Serialize};

/// IpBlock 类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpBlockType {
    Public,
    #[default]
    Private,
}

impl IpBlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpBlockType::Public => "public",
            IpBlockType::Private => "private",
        }
    }
}

impl std::str::FromStr for IpBlockType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(IpBlockType::Public),
            "private" => Ok(IpBlockType::Private),
            other => Err(crate::Error::InvalidArgument(format!("未知的 IpBlock 类型: {}", other))),
        }
    }
}

/// IpAddress 状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddressState {
    /// 已分配
    Allocated,
    /// 已标记释放，处于隔离期
    MarkedForDeallocation,
    /// 隔离期已过，可被重新分配
    Deallocated,
}

impl AddressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressState::Allocated => "allocated",
            AddressState::MarkedForDeallocation => "marked_for_deallocation",
            AddressState::Deallocated => "deallocated",
        }
    }
}

/// 通过 (block, address) 引用一个 IpAddress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRef {
    pub ip_block_id: i64,
    pub address: String,
}

impl AddressRef {
    pub fn new(ip_block_id: i64, address: impl Into<String>) -> Self {
        Self {
            ip_block_id,
            address: address.into(),
        }
    }
}

impl std::fmt::Display for AddressRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.address, self.ip_block_id)
    }
}
