use chrono_tz::Tz;
use shared::models::ConflictStrategy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 服务器配置 - 楼面节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（`.env` 文件由 `dotenv` 加载）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/floor | 工作目录 (数据库、日志) |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | {WORK_DIR}/logs | 日志目录 |
/// | VENUE_TIMEZONE | Europe/Madrid | 门店时区 |
/// | ENTITY_IDLE_TIMEOUT_SECS | 300 | 实体空闲回收时间 |
/// | ENTITY_MAILBOX_CAPACITY | 64 | 实体邮箱容量 |
/// | NO_SHOW_GRACE_MINUTES | 15 | 未到店宽限期 |
/// | NO_SHOW_HISTORY_LIMIT | 100 | 未到店历史条数上限 |
/// | NO_SHOW_FORFEIT_DEPOSIT | true | 未到店是否没收订金 |
/// | DEVICE_CODE_TTL_SECS | 900 | 设备码有效期 |
/// | DEVICE_CODE_MAX_POLLS | 180 | 设备码最大轮询次数 |
/// | PRINT_MAX_RETRIES | 3 | 打印最大重试次数 |
/// | PRINT_BACKOFF_BASE_SECS | 5 | 打印重试退避基数 |
/// | SYNC_MAX_ATTEMPTS | 5 | 离线同步最大尝试次数 |
/// | WAITLIST_TURN_MINUTES | 15 | 每桌平均翻台等待分钟 |
/// | HEALTH_LOG_INTERVAL_SECS | 60 | 运行时健康日志间隔 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/floor VENUE_TIMEZONE=Europe/Paris cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 运行时健康日志间隔
    pub health_log_interval: Duration,

    pub runtime: RuntimeConfig,
    pub no_show: NoShowConfig,
    pub device_auth: DeviceAuthConfig,
    pub print: PrintConfig,
    pub sync: SyncConfig,
    pub waitlist: WaitlistConfig,
}

/// Entity runtime settings
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Activations idle this long are evicted
    pub idle_timeout: Duration,
    pub mailbox_capacity: usize,
    /// Venue time zone; booking times are wall times in this zone
    pub timezone: Tz,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            mailbox_capacity: 64,
            timezone: chrono_tz::Europe::Madrid,
        }
    }
}

/// No-show detection
#[derive(Debug, Clone)]
pub struct NoShowConfig {
    pub grace_period: Duration,
    /// Ring buffer size of recorded no-shows
    pub history_limit: usize,
    /// Forfeit a paid deposit when marking no-show
    pub forfeit_deposit: bool,
}

impl Default for NoShowConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(15 * 60),
            history_limit: 100,
            forfeit_deposit: true,
        }
    }
}

/// Device authorization (device-code flow)
#[derive(Debug, Clone)]
pub struct DeviceAuthConfig {
    pub code_ttl: Duration,
    /// Poll cap; exceeding it forces the code to expire
    pub max_polls: u32,
    pub poll_interval_secs: u32,
}

impl Default for DeviceAuthConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(15 * 60),
            max_polls: 180,
            poll_interval_secs: 5,
        }
    }
}

/// Print job retry
#[derive(Debug, Clone)]
pub struct PrintConfig {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl PrintConfig {
    /// `2^retry × base`
    pub fn backoff(&self, retry: u32) -> Duration {
        exponential_backoff(self.backoff_base, retry)
    }
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

/// Offline sync queue
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub default_strategy: ConflictStrategy,
}

impl SyncConfig {
    pub fn backoff(&self, attempt: u32) -> Duration {
        exponential_backoff(self.backoff_base, attempt)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            default_strategy: ConflictStrategy::ServerWins,
        }
    }
}

/// Walk-in waitlist
#[derive(Debug, Clone)]
pub struct WaitlistConfig {
    /// Quoted wait per party ahead
    pub average_turn_minutes_per_party: u32,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self {
            average_turn_minutes_per_party: 15,
        }
    }
}

fn exponential_backoff(base: Duration, exponent: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(exponent.min(16)))
}

/// 读取并解析环境变量，失败时使用默认值
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/floor".into());
        let log_dir = std::env::var("LOG_DIR")
            .ok()
            .or_else(|| Some(format!("{}/logs", work_dir)));

        let timezone = std::env::var("VENUE_TIMEZONE")
            .ok()
            .and_then(|v| match v.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    tracing::warn!(value = %v, "Invalid VENUE_TIMEZONE, using default");
                    None
                }
            })
            .unwrap_or(chrono_tz::Europe::Madrid);

        let runtime = RuntimeConfig {
            idle_timeout: Duration::from_secs(env_parse("ENTITY_IDLE_TIMEOUT_SECS", 300)),
            mailbox_capacity: env_parse("ENTITY_MAILBOX_CAPACITY", 64),
            timezone,
        };
        let no_show = NoShowConfig {
            grace_period: Duration::from_secs(env_parse::<u64>("NO_SHOW_GRACE_MINUTES", 15) * 60),
            history_limit: env_parse("NO_SHOW_HISTORY_LIMIT", 100),
            forfeit_deposit: env_parse("NO_SHOW_FORFEIT_DEPOSIT", true),
        };
        let device_auth = DeviceAuthConfig {
            code_ttl: Duration::from_secs(env_parse("DEVICE_CODE_TTL_SECS", 900)),
            max_polls: env_parse("DEVICE_CODE_MAX_POLLS", 180),
            ..DeviceAuthConfig::default()
        };
        let print = PrintConfig {
            max_retries: env_parse("PRINT_MAX_RETRIES", 3),
            backoff_base: Duration::from_secs(env_parse("PRINT_BACKOFF_BASE_SECS", 5)),
        };
        let sync = SyncConfig {
            max_attempts: env_parse("SYNC_MAX_ATTEMPTS", 5),
            ..SyncConfig::default()
        };
        let waitlist = WaitlistConfig {
            average_turn_minutes_per_party: env_parse("WAITLIST_TURN_MINUTES", 15),
        };

        Self {
            work_dir,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir,
            health_log_interval: Duration::from_secs(env_parse("HEALTH_LOG_INTERVAL_SECS", 60)),
            runtime,
            no_show,
            device_auth,
            print,
            sync,
            waitlist,
        }
    }

    /// 使用自定义工作目录覆盖配置
    ///
    /// 常用于测试场景
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.log_dir = None;
        config
    }

    /// redb 数据库文件路径
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("floor.redb")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_backoff_doubles() {
        let print = PrintConfig::default();
        assert_eq!(print.backoff(0), Duration::from_secs(5));
        assert_eq!(print.backoff(1), Duration::from_secs(10));
        assert_eq!(print.backoff(3), Duration::from_secs(40));
    }

    #[test]
    fn test_defaults() {
        let device = DeviceAuthConfig::default();
        assert_eq!(device.code_ttl, Duration::from_secs(900));
        assert_eq!(device.max_polls, 180);
        assert_eq!(NoShowConfig::default().grace_period, Duration::from_secs(900));
    }
}
