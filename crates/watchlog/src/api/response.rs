use serde::Serialize;

use crate::feed::{FeedSnapshot, StepOutcome};

#[derive(Serialize)]
pub struct FeedResponse {
    pub outcome: StepOutcome,
    pub feed: FeedSnapshot,
}

#[derive(Serialize)]
pub struct MarkWatchedResponse {
    pub marked: usize,
    pub feed: FeedSnapshot,
}

#[derive(Serialize)]
pub struct RemoveFromHistoryResponse {
    pub removed: usize,
}
