//! 服务器状态 - 持有所有服务的单例引用
//!
//! ServerState 是整个引擎的核心数据结构，持有所有服务的共享引用。
//! 每个字段内部都是 Arc/池，Clone 成本极低。
//!
//! # 服务组件
//!
//! | 字段 | 类型 | 说明 |
//! |------|------|------|
//! | config | Config | 配置项 (不可变) |
//! | ledger | LedgerStorage | 事务核心存储 (redb) |
//! | pool | SqlitePool | 协作方数据 (购物车、地址) |
//! | orders | OrderManager | 订单工作流编排 |
//! | checkout | CheckoutManager | 结账会话管理 |
//! | reconciler | WebhookReconciler | 支付回调对账 |
//! | cart / addresses | 服务 | 协作方读写面 |
//! | notifier | Notifier | 域事件广播 |

use sqlx::SqlitePool;

use crate::checkout::CheckoutManager;
use crate::core::Config;
use crate::db::DbService;
use crate::orders::{LedgerStorage, OrderManager};
use crate::payment::WebhookReconciler;
use crate::services::{AddressService, CartService, Notifier};

/// 服务器状态
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub ledger: LedgerStorage,
    pub pool: SqlitePool,
    pub orders: OrderManager,
    pub checkout: CheckoutManager,
    pub reconciler: WebhookReconciler,
    pub cart: CartService,
    pub addresses: AddressService,
    pub notifier: Notifier,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：工作目录 → ledger (redb) → SQLite → 各服务。
    /// 初始化失败即退出进程 — 没有存储就没有引擎。
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let ledger = LedgerStorage::open(config.ledger_path())?;
        tracing::info!(path = %config.ledger_path(), "Ledger storage opened");

        let db = DbService::new(&config.db_path()).await?;

        Ok(Self::assemble(config.clone(), ledger, db.pool))
    }

    /// 全内存状态 (测试用): in-memory redb + in-memory SQLite
    pub async fn initialize_in_memory(config: Config) -> anyhow::Result<Self> {
        let ledger = LedgerStorage::open_in_memory()?;
        let db = DbService::new_in_memory().await?;
        Ok(Self::assemble(config, ledger, db.pool))
    }

    fn assemble(config: Config, ledger: LedgerStorage, pool: SqlitePool) -> Self {
        let notifier = Notifier::new();
        let orders = OrderManager::new(ledger.clone(), notifier.clone());
        let checkout = CheckoutManager::new(ledger.clone(), notifier.clone());
        let reconciler =
            WebhookReconciler::new(ledger.clone(), notifier.clone(), config.gateway.clone());
        let cart = CartService::new(pool.clone(), ledger.clone());
        let addresses = AddressService::new(pool.clone());

        Self {
            config,
            ledger,
            pool,
            orders,
            checkout,
            reconciler,
            cart,
            addresses,
            notifier,
        }
    }
}
