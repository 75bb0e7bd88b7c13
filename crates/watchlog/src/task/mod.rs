mod http_server;
mod subscription_refresher;

pub use http_server::http_server;
pub use subscription_refresher::subscription_refresher;
