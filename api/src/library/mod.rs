pub mod bookmark;
pub mod progress;
pub mod routes;
