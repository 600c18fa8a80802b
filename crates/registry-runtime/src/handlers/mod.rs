//! Request handlers for the `registry-node` binary.

pub mod rpc;
pub mod signing;

pub use rpc::{dispatch, handle_line, RpcRequest, RpcResponse};
pub use signing::OfflineSigner;
