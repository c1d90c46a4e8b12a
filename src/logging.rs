//! 控制台日志初始化
//!
//! 输出格式: `[YYYY-MM-DD HH:MM:SS]  INFO reallog::...: 消息`

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 默认日志指令（可被 RUST_LOG 覆盖）
const DEFAULT_DIRECTIVE: &str = "reallog=info";

/// 初始化 tracing 订阅者
///
/// 重复调用时静默忽略（测试中可能多次初始化）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_timer(ChronoLocal::new("[%Y-%m-%d %H:%M:%S]".to_string())))
        .with(filter)
        .try_init();
}
