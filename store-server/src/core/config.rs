//! 服务器配置
//!
//! # 环境变量
//!
//! 所有配置项都可以通过环境变量覆盖：
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | WORK_DIR | /var/lib/store | 工作目录 (ledger, SQLite, 日志) |
//! | HTTP_PORT | 3000 | HTTP 服务端口 |
//! | ENVIRONMENT | development | 运行环境 |
//! | LOG_DIR | (无) | 日志目录，设置后启用按日滚动文件输出 |
//! | GATEWAY_MERCHANT_ID | 10000100 | 支付网关商户 ID |
//! | GATEWAY_MERCHANT_KEY | 46f0cd694581a | 支付网关商户密钥 |
//! | GATEWAY_PASSPHRASE | dev-passphrase | 签名口令 |
//!
//! # 示例
//!
//! ```ignore
//! WORK_DIR=/data/store HTTP_PORT=8080 cargo run
//! ```

use crate::payment::GatewayConfig;

/// 服务器配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储 ledger 数据库、SQLite 数据库和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 日志目录 (可选；设置后启用滚动文件输出)
    pub log_dir: Option<String>,
    /// 支付网关凭据
    pub gateway: GatewayConfig,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/store".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            gateway: GatewayConfig::from_env(),
        }
    }

    /// 使用自定义值覆盖部分配置 (测试用)
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// ledger (redb) 数据库路径
    pub fn ledger_path(&self) -> String {
        format!("{}/ledger.redb", self.work_dir)
    }

    /// SQLite 数据库路径
    pub fn db_path(&self) -> String {
        format!("{}/store.db", self.work_dir)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
