/// 统一错误定义

use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("无效的 CIDR: {0}")]
    InvalidCidr(String),

    #[error("公网 CIDR 不唯一: {0}")]
    DuplicatePublicCidr(String),

    #[error("IpBlock 不存在: {0}")]
    IpBlockNotFound(String),

    #[error("IpAddress 不存在: {0}")]
    IpAddressNotFound(String),

    #[error("地址不属于 IpBlock: {0}")]
    AddressNotInBlock(String),

    #[error("地址已被分配: {0}")]
    AddressAlreadyAllocated(String),

    #[error("IpBlock 已满: {0}")]
    IpBlockFull(String),

    #[error("IpBlock 仍有地址记录，无法删除: {0}")]
    IpBlockInUse(String),

    #[error("策略不存在: {0}")]
    PolicyNotFound(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl Error {
    /// 转换为字符串码，供服务层映射为传输层状态
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCidr(_) => "INVALID_CIDR",
            Self::DuplicatePublicCidr(_) => "DUPLICATE_PUBLIC_CIDR",
            Self::IpBlockNotFound(_) => "IP_BLOCK_NOT_FOUND",
            Self::IpAddressNotFound(_) => "IP_ADDRESS_NOT_FOUND",
            Self::AddressNotInBlock(_) => "ADDRESS_NOT_IN_BLOCK",
            Self::AddressAlreadyAllocated(_) => "ADDRESS_ALREADY_ALLOCATED",
            Self::IpBlockFull(_) => "IP_BLOCK_FULL",
            Self::IpBlockInUse(_) => "IP_BLOCK_IN_USE",
            Self::PolicyNotFound(_) => "POLICY_NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为查找未命中类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::IpBlockNotFound(_) | Self::IpAddressNotFound(_) | Self::PolicyNotFound(_)
        )
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::IpBlockFull("1".into()).code(), "IP_BLOCK_FULL");
        assert_eq!(
            Error::AddressAlreadyAllocated("10.0.0.1".into()).code(),
            "ADDRESS_ALREADY_ALLOCATED"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::IpBlockNotFound("1".into()).is_not_found());
        assert!(Error::IpAddressNotFound("10.0.0.1".into()).is_not_found());
        assert!(!Error::IpBlockFull("1".into()).is_not_found());
    }
}
