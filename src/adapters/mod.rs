// Adapters layer: concrete implementations for external systems (search endpoint, durable storage, file watching).

pub mod http;
pub mod storage;
pub mod watch;
