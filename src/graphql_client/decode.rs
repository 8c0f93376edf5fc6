use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::graphql_client::error::{ClientError, decode_error};

/// Bytes of payload shown on each side of a type-mismatch offset.
pub const CONTEXT_WINDOW_BYTES: usize = 100;

/// Decodes `payload` into `T`.
///
/// Type mismatches carry the payload text around the failing offset so the
/// message is useful without dumping the whole response.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(payload).map_err(|err| {
        if err.classify() != Category::Data {
            return decode_error(format!("graphql: cannot unmarshal: {}", err));
        }
        match error_offset(payload, err.line(), err.column()) {
            Some(offset) => decode_error(format!(
                "graphql: cannot unmarshal at offset {}: {}: {}",
                offset,
                describe_window(payload, offset),
                err
            )),
            None => decode_error(format!("graphql: cannot unmarshal: {}", err)),
        }
    })
}

/// Renders `before "..."` and, when the offset is inside the payload, `after "..."`.
pub fn describe_window(payload: &[u8], offset: usize) -> String {
    let offset = offset.min(payload.len());
    let start = offset.saturating_sub(CONTEXT_WINDOW_BYTES);
    let before = String::from_utf8_lossy(&payload[start..offset]);
    if offset >= payload.len() {
        return format!("before {:?}", before);
    }

    let end = (offset + CONTEXT_WINDOW_BYTES).min(payload.len());
    let after = String::from_utf8_lossy(&payload[offset..end]);
    format!("before {:?}; after {:?}", before, after)
}

/// Byte offset just past the position serde_json reported (1-based line, byte column).
fn error_offset(payload: &[u8], line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }

    let line_start = if line == 1 {
        0
    } else {
        payload
            .iter()
            .enumerate()
            .filter(|(_, byte)| **byte == b'\n')
            .nth(line - 2)
            .map(|(idx, _)| idx + 1)?
    };

    Some((line_start + column).min(payload.len()))
}
