pub use super::watch_mark::Entity as WatchMark;
