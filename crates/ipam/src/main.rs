/// IPAM 守护进程
///
/// 建立存储连接并运行地址清理任务。

use std::sync::Arc;

use ipam::db::{establish_connection, sync_schema};
use ipam::{AppState, Config, DeallocationService, IpamStore, MemoryStore, SeaOrmStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    let cfg = Config::from_env()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 IPAM 服务...");
    info!("✅ 配置加载成功");

    let store: Arc<dyn IpamStore> = if cfg.use_memory_store() {
        warn!("使用内存存储，进程退出后数据丢失");
        Arc::new(MemoryStore::new())
    } else {
        let db = establish_connection(&cfg.database_url).await?;
        info!("✅ 数据库连接成功");

        sync_schema(&db).await?;
        info!("✅ 数据表同步完成");

        Arc::new(SeaOrmStore::new(db))
    };

    let ip_generator = cfg.ip_generator()?;
    info!("✅ 地址生成器: {}", ip_generator.name());

    let state = AppState::new(store, cfg.settings()).with_ip_generator(ip_generator);

    let sweeper = DeallocationService::new(state).start_purge_sweeper(cfg.purge_interval_secs);
    info!("✅ 地址清理任务已启动（每 {} 秒执行一次）", cfg.purge_interval_secs);

    tokio::signal::ctrl_c().await?;
    info!("收到退出信号，正在停止...");
    sweeper.abort();

    Ok(())
}
