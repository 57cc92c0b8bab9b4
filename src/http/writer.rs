use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::{Response, ResponseBody};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Chunk size used when streaming file bodies.
const FILE_CHUNK_SIZE: usize = 8192;

fn serialize_head(resp: &Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    if resp.header("Connection").is_none() {
        let value: &[u8] = if keep_alive { b"keep-alive" } else { b"close" };
        buf.extend_from_slice(b"Connection: ");
        buf.extend_from_slice(value);
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Writes a response to a stream: the serialized head first, then the body.
///
/// File bodies are streamed in fixed-size chunks and the file handle is
/// dropped as soon as the writer is, whichever way writing ends.
pub struct ResponseWriter {
    head: Vec<u8>,
    body: ResponseBody,
}

impl ResponseWriter {
    /// `head_only` suppresses the body bytes, as required for HEAD requests.
    pub fn new(response: Response, keep_alive: bool, head_only: bool) -> Self {
        let head = serialize_head(&response, keep_alive);
        let body = if head_only {
            ResponseBody::Empty
        } else {
            response.body
        };
        Self { head, body }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        stream.write_all(&self.head).await?;

        match std::mem::take(&mut self.body) {
            ResponseBody::Empty => {}
            ResponseBody::Bytes(bytes) => {
                stream.write_all(&bytes).await?;
            }
            ResponseBody::File { mut file, len } => {
                let mut remaining = len;
                let mut chunk = vec![0u8; FILE_CHUNK_SIZE];

                while remaining > 0 {
                    let want = remaining.min(FILE_CHUNK_SIZE as u64) as usize;
                    let n = file.read(&mut chunk[..want]).await?;

                    if n == 0 {
                        return Err(anyhow::anyhow!(
                            "file truncated while streaming ({} bytes short)",
                            remaining
                        ));
                    }

                    stream.write_all(&chunk[..n]).await?;
                    remaining -= n as u64;
                }
            }
        }

        stream.flush().await?;
        Ok(())
    }
}
