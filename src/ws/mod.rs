//! WebSocket transport

pub mod fanout;
pub mod handler;
pub mod protocol;
