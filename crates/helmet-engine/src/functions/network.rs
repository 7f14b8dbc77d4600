//! Host name resolution
//!
//! Only registered when the engine is built with DNS enabled; otherwise a
//! template calling `getHostByName` fails as an undefined function.

use std::net::ToSocketAddrs;

use super::{Arity, FunctionTable, str_arg};

pub(super) fn register(table: &mut FunctionTable) {
    table.plain("getHostByName", Arity::Exact(1), |a| Ok(get_host_by_name(str_arg(&a[0])?).into()));
}

/// First address the resolver returns, or empty when resolution fails
///
/// Usage: {{ getHostByName "www.example.com" }}
fn get_host_by_name(name: &str) -> String {
    match (name, 0).to_socket_addrs() {
        Ok(mut addrs) => addrs.next().map(|a| a.ip().to_string()).unwrap_or_default(),
        Err(err) => {
            tracing::debug!(host = name, error = %err, "host name resolution failed");
            String::new()
        }
    }
}
