use store_server::{init_logger_with_file, Config, Server, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境与日志
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(
        std::env::var("LOG_LEVEL").ok().as_deref(),
        config.is_production(),
        config.log_dir.as_deref(),
    )?;

    tracing::info!(
        work_dir = %config.work_dir,
        port = config.http_port,
        environment = %config.environment,
        "Store server starting"
    );

    // 2. 初始化状态 (ledger + SQLite + 各服务)
    let state = ServerState::initialize(&config).await?;

    // 3. 启动 HTTP 服务器
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
