//! Message framing for the stdio transport.
//!
//! Clients may send either `Content-Length: N\r\n\r\n<body>` frames or one
//! JSON document per line; [`FrameReader`] detects which on every message.
//! Responses are always written one per line.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

const CONTENT_LENGTH: &str = "content-length:";

/// Reads framed messages from an async byte stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Next message body, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an I/O error on read failure, a malformed length header, or a
    /// body that is not UTF-8.
    pub async fn next_message(&mut self) -> io::Result<Option<String>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let is_header = trimmed
                .get(..CONTENT_LENGTH.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CONTENT_LENGTH));
            if !is_header {
                return Ok(Some(trimmed.to_string()));
            }

            let len: usize = trimmed[CONTENT_LENGTH.len()..]
                .trim()
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.skip_headers().await?;

            let mut body = vec![0u8; len];
            self.reader.read_exact(&mut body).await?;
            let body =
                String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            return Ok(Some(body));
        }
    }

    /// Consume remaining headers up to and including the blank separator line.
    async fn skip_headers(&mut self) -> io::Result<()> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF inside Content-Length headers",
                ));
            }
            if self.line.trim().is_empty() {
                return Ok(());
            }
        }
    }
}

/// Write `json` followed by a newline and flush.
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> io::Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// `Content-Length` frame for `json`, as sent by header-framing clients.
pub fn encode_content_length(json: &str) -> Vec<u8> {
    let mut buf = format!("Content-Length: {}\r\n\r\n", json.len()).into_bytes();
    buf.extend_from_slice(json.as_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_newline_delimited() {
        let input = b"{\"id\":1}\n\n{\"id\":2}\r\n";
        let mut reader = FrameReader::new(&input[..]);
        assert_eq!(reader.next_message().await.unwrap().unwrap(), "{\"id\":1}");
        assert_eq!(reader.next_message().await.unwrap().unwrap(), "{\"id\":2}");
        assert!(reader.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_content_length_with_extra_headers() {
        let body = r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#;
        let framed = format!(
            "content-length: {}\r\nContent-Type: application/json\r\n\r\n{body}",
            body.len()
        );
        let mut reader = FrameReader::new(framed.as_bytes());
        assert_eq!(reader.next_message().await.unwrap().unwrap(), body);
    }

    #[tokio::test]
    async fn test_mixed_framing_in_one_stream() {
        let first = r#"{"id":1}"#;
        let mut input = encode_content_length(first);
        input.extend_from_slice(b"{\"id\":2}\n");
        let mut reader = FrameReader::new(&input[..]);
        assert_eq!(reader.next_message().await.unwrap().unwrap(), first);
        assert_eq!(reader.next_message().await.unwrap().unwrap(), "{\"id\":2}");
    }

    #[tokio::test]
    async fn test_bad_length_is_invalid_data() {
        let mut reader = FrameReader::new(&b"Content-Length: many\r\n\r\n{}"[..]);
        let err = reader.next_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_truncated_headers_are_unexpected_eof() {
        let mut reader = FrameReader::new(&b"Content-Length: 10\r\n"[..]);
        let err = reader.next_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let mut buf = Vec::new();
        write_line(&mut buf, r#"{"id":1}"#).await.unwrap();
        assert_eq!(buf, b"{\"id\":1}\n");
    }
}
