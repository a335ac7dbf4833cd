//! Canonical NDJSON wire encoding.

use crate::error::GatewayError;
use crate::types::CanonicalChunk;

/// Serialize one canonical chunk as an NDJSON line (trailing newline included).
pub fn encode_chunk_line(chunk: &CanonicalChunk) -> Result<Vec<u8>, GatewayError> {
    let mut line = serde_json::to_vec(chunk)
        .map_err(|e| GatewayError::Internal(format!("chunk serialization failed: {e}")))?;
    line.push(b'\n');
    Ok(line)
}

/// Serialize an in-band error frame as an NDJSON line.
pub fn encode_error_line(model: &str, error: &str) -> Vec<u8> {
    let frame = CanonicalChunk::error_frame(model, error);
    // Error frames contain only gateway-controlled strings.
    encode_chunk_line(&frame).unwrap_or_else(|_| b"{\"error\":\"internal error\"}\n".to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_newline_terminated_single_objects() {
        let line = encode_chunk_line(&CanonicalChunk::content("m", "hi")).unwrap();
        assert!(line.ends_with(b"\n"));
        let parsed: serde_json::Value = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
        assert_eq!(parsed["message"]["content"], "hi");
    }

    #[test]
    fn error_line_carries_error_key() {
        let line = encode_error_line("m", "backend down");
        let parsed: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(parsed["error"], "backend down");
        assert_eq!(parsed["done"], false);
    }
}
