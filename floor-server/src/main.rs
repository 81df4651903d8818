use floor_server::{BackgroundTasks, Config, FloorState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志)
    setup_environment()?;

    // 打印横幅
    print_banner();

    tracing::info!("Floor Server starting...");

    // 2. 加载配置
    let config = Config::from_env();
    tracing::info!(
        work_dir = %config.work_dir,
        environment = %config.environment,
        timezone = %config.runtime.timezone,
        "Configuration loaded"
    );

    // 3. 打开存储并构建运行时
    let state = FloorState::initialize(&config)?;

    // 4. 后台任务: 恢复持久化提醒 + 健康日志
    let mut tasks = BackgroundTasks::new();
    tasks.spawn_reminder_restore(state.runtime.clone());
    tasks.spawn_health_log(state.runtime.clone(), config.health_log_interval);
    tasks.log_summary();

    tracing::info!("Floor Server ready, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    state.runtime.shutdown();
    tasks.shutdown().await;

    tracing::info!("Floor Server stopped");
    Ok(())
}
