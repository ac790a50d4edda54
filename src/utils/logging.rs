use chrono::Utc;
use chrono_tz::Asia::Shanghai;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志时间戳用北京时间，与交易日、调度波次同一时区
struct CnTime;

impl FormatTime for CnTime {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&Shanghai);
        write!(w, "{}", now.format("%m-%d %H:%M:%S%.3f"))
    }
}

/// 控制台始终输出；LOG_TO_FILE=1 时再追加按天轮转的文件日志。
/// 默认过滤压低轮询型依赖的噪声，RUST_LOG 可整体覆盖
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tokio_cron_scheduler=warn,hyper=warn,reqwest=warn")
    });

    let file_layer = std::env::var("LOG_TO_FILE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
        .then(|| {
            let dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "leeksaver.log");
            fmt::layer()
                .with_timer(CnTime)
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(CnTime).with_target(true))
        .with(file_layer)
        .init();
}
