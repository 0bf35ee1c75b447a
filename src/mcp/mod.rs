//! MCP (Model Context Protocol) server over stdio

pub mod guide;
pub mod protocol;
pub mod server;
pub mod tools;
