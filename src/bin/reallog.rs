//! reallog - 实时日志服务
//!
//! 负责：
//! - 监控日志文件新增内容
//! - WebSocket 推送给查看者
//! - HTTP 重启 / 配置查询接口

use anyhow::Result;
use reallog::{logging, LogServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    tracing::info!("🚀 reallog v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    tracing::debug!("配置: {:?}", config);

    let server = LogServer::new(config);
    server.run().await?;

    tracing::info!("👋 reallog exiting");
    Ok(())
}
