//! Strict schema decoding of store replies.
//!
//! Every operation has exactly one accepted reply shape per status. Anything
//! else is [`ScriptReply::Malformed`], which surfaces as a protocol violation
//! and is never confused with a domain-level `not_found` or `error` status.

use rollcall_common::{Result, RollcallError};
use rollcall_store::Reply;

use crate::model::NodeInfo;

const STATUS_OK: &str = "ok";
const STATUS_NOT_FOUND: &str = "not_found";
const STATUS_ERROR: &str = "error";

/// Decoded reply of one store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply<T> {
    Ok(T),
    NotFound,
    /// The store-side operation signalled an error with this message
    Err(String),
    /// The reply did not match the operation's schema
    Malformed(String),
}

impl<T> ScriptReply<T> {
    /// Map onto the error taxonomy. `node_id` names the subject of `NotFound`.
    pub fn into_result(self, operation: &'static str, node_id: &str) -> Result<T> {
        match self {
            ScriptReply::Ok(value) => Ok(value),
            ScriptReply::NotFound => Err(RollcallError::NodeNotRegistered(node_id.to_string())),
            ScriptReply::Err(message) => Err(RollcallError::ScriptReported(message)),
            ScriptReply::Malformed(detail) => Err(RollcallError::protocol(operation, detail)),
        }
    }
}

fn unexpected<T>(expected: &str, reply: &Reply) -> ScriptReply<T> {
    ScriptReply::Malformed(format!(
        "expected {}, got {} {}",
        expected,
        reply.kind(),
        reply
    ))
}

/// `register_or_refresh`: a single non-negative integer
pub fn decode_ordinal(reply: &Reply) -> ScriptReply<u64> {
    match reply {
        Reply::Integer(ordinal) if *ordinal >= 0 => ScriptReply::Ok(*ordinal as u64),
        Reply::Integer(ordinal) => ScriptReply::Malformed(format!("negative ordinal {}", ordinal)),
        other => unexpected("integer ordinal", other),
    }
}

/// `deregister`: the number of records removed, 0 or 1
pub fn decode_removed(reply: &Reply) -> ScriptReply<bool> {
    match reply {
        Reply::Integer(0) => ScriptReply::Ok(false),
        Reply::Integer(1) => ScriptReply::Ok(true),
        other => unexpected("removed count 0 or 1", other),
    }
}

/// `get_node_info`: `["ok", ordinal, total]`, `["not_found"]` or `["error", message]`
pub fn decode_node_info(reply: &Reply) -> ScriptReply<NodeInfo> {
    let Reply::Array(items) = reply else {
        return unexpected("status array", reply);
    };

    match items.as_slice() {
        [Reply::Text(status), Reply::Integer(ordinal), Reply::Integer(total)]
            if status == STATUS_OK =>
        {
            if *ordinal < 0 || *total <= 0 || ordinal >= total {
                return ScriptReply::Malformed(format!(
                    "inconsistent node info: ordinal {} of {} nodes",
                    ordinal, total
                ));
            }
            ScriptReply::Ok(NodeInfo {
                ordinal: *ordinal as u64,
                total: *total as u64,
            })
        }
        [Reply::Text(status)] if status == STATUS_NOT_FOUND => ScriptReply::NotFound,
        [Reply::Text(status), Reply::Text(message)] if status == STATUS_ERROR => {
            ScriptReply::Err(message.clone())
        }
        _ => ScriptReply::Malformed(format!("unrecognized node info reply {}", reply)),
    }
}

/// `monitor`: an array of evicted node ids, possibly empty
pub fn decode_evicted(reply: &Reply) -> ScriptReply<Vec<String>> {
    let Reply::Array(items) = reply else {
        return unexpected("array of node ids", reply);
    };

    let mut evicted = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Reply::Text(node_id) => evicted.push(node_id.clone()),
            other => return unexpected("node id text", other),
        }
    }
    ScriptReply::Ok(evicted)
}
