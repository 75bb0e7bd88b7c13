use std::convert::Infallible;
use std::sync::Arc;

use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use axum::routing::get;
use axum::{Extension, Router};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::feed::DrainController;

pub(super) fn router() -> Router {
    Router::new().route("/sse/feed", get(feed_events))
}

/// 推送浏览状态的变化，连接建立时先推送当前状态
async fn feed_events(
    Extension(controller): Extension<Arc<DrainController>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(controller.subscribe()).filter_map(async |snapshot| {
        match serde_json::to_string(&snapshot) {
            Ok(snapshot) => Some(Ok(Event::default().data(snapshot))),
            Err(e) => {
                error!("序列化浏览状态失败：{:#}", e);
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
