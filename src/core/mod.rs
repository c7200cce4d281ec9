pub mod bridge;
pub mod http_server;
pub mod session;

pub use bridge::RequestBridge;
pub use http_server::HttpServer;
pub use session::Session;
