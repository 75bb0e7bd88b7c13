mod error;
mod request;
mod response;
mod routes;
mod wrapper;

pub use routes::router;
