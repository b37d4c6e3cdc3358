//! Transport - Getting encoded records to the far end

mod loopback;
mod tcp;

pub use loopback::LoopbackTransport;
pub use tcp::TcpTransport;
