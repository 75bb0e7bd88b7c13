use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Extension;

use crate::api::router;
use crate::config::VersionedConfig;
use crate::feed::DrainController;
use crate::subscriptions::SubscriptionDigests;

pub async fn http_server(controller: Arc<DrainController>, digests: Arc<SubscriptionDigests>) -> Result<()> {
    let app = router().layer(Extension(controller)).layer(Extension(digests));
    let bind_address = VersionedConfig::get().load().bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .context("bind address failed")?;
    info!("开始运行管理接口: http://{}", bind_address);
    Ok(axum::serve(listener, app.into_make_service()).await?)
}
