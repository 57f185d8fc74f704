//! Incremental line framing for SSE and NDJSON response bodies.

use crate::ProviderError;

/// Buffers raw body chunks and yields complete lines.
///
/// Bytes are kept until a newline arrives, so multi-byte characters and lines split across
/// network chunks are reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, without trailing `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline_index) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=newline_index).collect::<Vec<_>>();
            lines.push(decode_line(&line)?);
        }

        Ok(lines)
    }

    /// Flushes a final unterminated line, if any.
    pub fn finish(&mut self) -> Result<Option<String>, ProviderError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let rest = std::mem::take(&mut self.buffer);
        let line = decode_line(&rest)?;
        Ok((!line.trim().is_empty()).then_some(line))
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, ProviderError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| ProviderError::protocol(format!("response body is not UTF-8: {err}")))?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Payload of an SSE `data:` line; `None` for comments, event names, and blank lines.
pub fn sse_data(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?.trim();
    (!payload.is_empty()).then_some(payload)
}

pub const SSE_DONE: &str = "[DONE]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").expect("push").is_empty());

        let lines = decoder.push(b"1}\n\ndata: [DONE]\n").expect("push");
        assert_eq!(lines, vec!["data: {\"a\":1}", "", "data: [DONE]"]);
    }

    #[test]
    fn multibyte_characters_split_between_chunks_decode() {
        let bytes = "data: 你好\n".as_bytes();
        let (head, tail) = bytes.split_at(8);

        let mut decoder = LineDecoder::new();
        assert!(decoder.push(head).expect("push head").is_empty());
        assert_eq!(decoder.push(tail).expect("push tail"), vec!["data: 你好"]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"done\":true}").expect("push");
        assert_eq!(decoder.finish().expect("finish"), Some("{\"done\":true}".to_string()));
        assert_eq!(decoder.finish().expect("finish"), None);
    }

    #[test]
    fn sse_data_ignores_non_data_lines() {
        assert_eq!(sse_data("data: {}"), Some("{}"));
        assert_eq!(sse_data("event: ping"), None);
        assert_eq!(sse_data(": keep-alive"), None);
        assert_eq!(sse_data("data:"), None);
    }
}
