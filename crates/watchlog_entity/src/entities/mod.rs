pub mod prelude;

pub mod watch_mark;
