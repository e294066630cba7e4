//! A TCP [`Transport`](crate::Transport), one connection per request.

mod server;
mod transport;

pub use server::{process_message, serve};
pub use transport::TcpTransport;
