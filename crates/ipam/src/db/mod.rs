/// 数据库访问层

pub mod models;

use common::{Error, Result};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema, SqlErr};
use tracing::info;

use models::{ip_address, ip_block, ip_nat_relation, policy};

/// 建立数据库连接 (SeaORM)
pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection> {
    info!("正在连接数据库: {}", database_url);

    let db = Database::connect(database_url).await.db()?;
    info!("数据库连接成功");

    Ok(db)
}

/// 创建缺失的表和唯一索引
pub async fn sync_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(policy::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(ip_block::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(ip_address::Entity).if_not_exists().to_owned(),
        schema.create_table_from_entity(ip_nat_relation::Entity).if_not_exists().to_owned(),
    ];
    for table in tables.iter() {
        db.execute(backend.build(table)).await.db()?;
    }

    let indexes = [
        Index::create()
            .name("idx_ip_addresses_block_address")
            .table(ip_address::Entity)
            .col(ip_address::Column::IpBlockId)
            .col(ip_address::Column::Address)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_ip_nat_relations_pair")
            .table(ip_nat_relation::Entity)
            .col(ip_nat_relation::Column::InsideLocalAddressId)
            .col(ip_nat_relation::Column::InsideGlobalAddressId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];
    for index in indexes.iter() {
        db.execute(backend.build(index)).await.db()?;
    }

    info!("数据库表结构已同步");
    Ok(())
}

/// 是否为唯一约束冲突
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// 将 SeaORM 错误转换为统一错误类型
pub trait DbResultExt<T> {
    fn db(self) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, DbErr> {
    fn db(self) -> Result<T> {
        self.map_err(|e| Error::Database(e.to_string()))
    }
}
