//! Engine class wrappers.

mod rendering_server;

pub use rendering_server::RenderingServer;
