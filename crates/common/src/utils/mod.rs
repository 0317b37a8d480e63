/// 工具函数集合

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::errors::{Error, Result};

/// 解析 IPv4 CIDR
///
/// 必须显式给出前缀长度；允许主机位非零（如 `10.1.1.0/2`），
/// 地址区间按掩码后的网络地址计算。
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Network> {
    let trimmed = cidr.trim();
    if !trimmed.contains('/') {
        return Err(Error::InvalidCidr(format!("{}: 缺少前缀长度", cidr)));
    }

    trimmed
        .parse::<Ipv4Network>()
        .map_err(|e| Error::InvalidCidr(format!("{}: {}", cidr, e)))
}

/// 解析点分十进制 IPv4 地址
pub fn parse_address(address: &str) -> Result<Ipv4Addr> {
    address
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| Error::InvalidArgument(format!("无效的 IP 地址: {}", address)))
}

/// 地址的规范文本形式，存储和查找都使用该形式
pub fn canonical_address(address: &str) -> Result<String> {
    parse_address(address).map(|ip| ip.to_string())
}

/// CIDR 覆盖的地址区间（含网络地址和广播地址）
pub fn address_range(network: &Ipv4Network) -> (u32, u32) {
    (u32::from(network.network()), u32::from(network.broadcast()))
}
