//! Store Server - 订单生命周期与结账并发引擎
//!
//! # 架构概述
//!
//! 本模块是引擎的主入口，提供以下核心功能：
//!
//! - **库存账本** (`stock`): 可用/预留/在库数量追踪
//! - **抵扣券账本** (`credit`): 以旧换新信用余额与锁定
//! - **结账会话** (`checkout`): 30 分钟事务上下文与互斥锁
//! - **订单聚合** (`orders`): 状态机、工作流编排、乐观并发
//! - **支付对账** (`payment`): 签名网关适配与幂等回调处理
//! - **HTTP API** (`api`): RESTful 接口
//!
//! # 模块结构
//!
//! ```text
//! store-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── orders/        # 订单聚合、状态机、动作、管理器
//! ├── checkout/      # 结账会话管理
//! ├── payment/       # 网关适配、回调对账、投递包络
//! ├── stock/         # 库存账本
//! ├── credit/        # 抵扣券账本
//! ├── services/      # 购物车、地址、事件广播
//! ├── db/            # SQLite 协作方数据
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod checkout;
pub mod core;
pub mod credit;
pub mod db;
pub mod orders;
pub mod payment;
pub mod services;
pub mod stock;
pub mod utils;

// Re-export 公共类型
pub use checkout::CheckoutManager;
pub use core::{Config, Server, ServerState};
pub use orders::{LedgerStorage, OrderError, OrderManager};
pub use payment::{GatewayConfig, WebhookReconciler};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
