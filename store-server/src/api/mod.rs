//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`cart`] - 购物车 (写时库存校验)
//! - [`checkout`] - 结账会话、信用抵扣券验证、运费
//! - [`orders`] - 订单查询和工作流操作
//! - [`payments`] - 支付请求构建和网关回调
//! - [`credit`] - 抵扣券签发/作废/过期清扫
//! - [`skus`] - 库存管理

pub mod cart;
pub mod checkout;
pub mod credit;
pub mod health;
pub mod orders;
pub mod payments;
pub mod skus;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};
