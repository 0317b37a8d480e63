pub mod ip_address;
pub mod ip_block;
pub mod ip_nat_relation;
pub mod policy;

pub type IpBlock = ip_block::Model;
pub type IpAddress = ip_address::Model;
pub type IpNatRelation = ip_nat_relation::Model;
pub type Policy = policy::Model;
