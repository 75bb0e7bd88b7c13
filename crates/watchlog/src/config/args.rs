use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::LazyLock;

use clap::Parser;

pub static ARGS: LazyLock<Args> = LazyLock::new(Args::parse);

#[derive(Parser)]
#[command(name = "watchlog", version = detail_version(), about, long_about = None)]
pub struct Args {
    #[arg(short, long, default_value = "None,watchlog=info", env = "RUST_LOG")]
    pub log_level: String,

    #[arg(short, long, env = "WATCHLOG_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// 只运行一次订阅刷新，不启动 HTTP 服务
    #[arg(long, env = "WATCHLOG_REFRESH_ONCE")]
    pub refresh_once: bool,
}

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn version() -> Cow<'static, str> {
    if let (Some(git_version), Some(git_dirty)) = (built_info::GIT_VERSION, built_info::GIT_DIRTY) {
        Cow::Owned(format!("{}{}", git_version, if git_dirty { "-dirty" } else { "" }))
    } else {
        Cow::Borrowed(built_info::PKG_VERSION)
    }
}

fn detail_version() -> String {
    format!(
        "{}
Architecture: {}-{}
Built Time: {}
Rustc Version: {}",
        version(),
        built_info::CFG_OS,
        built_info::CFG_TARGET_ARCH,
        built_info::BUILT_TIME_UTC,
        built_info::RUSTC_VERSION,
    )
}
