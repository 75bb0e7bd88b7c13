use tracing_subscriber::util::SubscriberInitExt;

pub mod signal;

pub fn init_logger(log_level: &str) {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .compact()
        .with_env_filter(tracing_subscriber::EnvFilter::builder().parse_lossy(log_level))
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%b %d %H:%M:%S".to_owned(),
        ))
        .finish();
    // 测试中可能被多次调用
    if let Err(e) = subscriber.try_init() {
        eprintln!("初始化日志失败：{e}");
    }
}
