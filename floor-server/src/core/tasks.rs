//! 后台任务管理
//!
//! 楼面节点的后台任务：启动时恢复持久化提醒，周期性输出运行时健康日志。
//!
//! # 任务类型
//!
//! - [`TaskKind::Warmup`] - 启动预热（运行一次，例如提醒恢复）
//! - [`TaskKind::Periodic`] - 定时任务，直到 shutdown 才退出

use crate::runtime::Runtime;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Warmup,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Warmup => f.write_str("warmup"),
            TaskKind::Periodic => f.write_str("periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.spawn_reminder_restore(runtime.clone());
/// tasks.spawn_health_log(runtime.clone(), Duration::from_secs(60));
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 取消令牌（任务内部监听 shutdown 信号）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 注册并启动一个后台任务
    ///
    /// 任务会被包装以捕获 panic，异常退出会记录错误日志。
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let wrapped_future = async move {
            let result: Result<(), Box<dyn std::any::Any + Send>> =
                AssertUnwindSafe(future).catch_unwind().await;
            match result {
                Ok(()) => {
                    if kind != TaskKind::Warmup {
                        tracing::debug!(task = %name, kind = %kind, "Background task finished");
                    }
                }
                Err(panic_info) => {
                    let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_msg,
                        "Background task panicked"
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    /// 恢复所有持久化提醒（重启后重新挂载）
    pub fn spawn_reminder_restore(&mut self, runtime: Runtime) {
        self.spawn("reminder_restore", TaskKind::Warmup, async move {
            match runtime.restore_reminders() {
                Ok(count) => tracing::debug!(count, "Reminder restore warmup done"),
                Err(e) => tracing::error!(error = %e, "Failed to restore reminders"),
            }
        });
    }

    /// 周期性输出运行时健康状况
    pub fn spawn_health_log(&mut self, runtime: Runtime, interval: Duration) {
        let token = self.shutdown_token();
        self.spawn("runtime_health", TaskKind::Periodic, async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tracing::info!(
                            active_entities = runtime.active_count(),
                            reminders = runtime.scheduler().reminder_count(),
                            timers = runtime.scheduler().timer_count(),
                            "Runtime health"
                        );
                    }
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 某类任务的数量
    pub fn count(&self, kind: TaskKind) -> usize {
        self.tasks.iter().filter(|t| t.kind == kind).count()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.tasks.len(),
            warmup = self.count(TaskKind::Warmup),
            periodic = self.count(TaskKind::Periodic),
            "Background tasks registered"
        );
    }

    /// 检查非预热任务是否意外结束，返回异常任务数量
    pub fn check_health(&self) -> usize {
        let failed = self
            .tasks
            .iter()
            .filter(|t| t.kind != TaskKind::Warmup && t.handle.is_finished())
            .inspect(|t| {
                tracing::error!(task = %t.name, kind = %t.kind, "Background task unexpectedly finished");
            })
            .count();
        if failed > 0 {
            tracing::error!(failed, total = self.tasks.len(), "Background task health check failed");
        }
        failed
    }

    /// Graceful shutdown - 取消所有任务并等待完成
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
            }
        }
        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("boom", TaskKind::Periodic, async { panic!("boom") });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tasks.check_health(), 1);
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_periodic_stops_on_shutdown() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();
        tasks.spawn("tick", TaskKind::Periodic, async move {
            token.cancelled().await;
        });
        assert_eq!(tasks.count(TaskKind::Periodic), 1);
        assert_eq!(tasks.count(TaskKind::Warmup), 0);
        assert_eq!(tasks.check_health(), 0);
        tasks.shutdown().await;
    }
}
