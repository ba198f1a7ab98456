//! Response body handling. Bodies are always read to the end so the pooled
//! connection can be reused.

use reqwest::Response;

/// Bytes of an error body kept for the failure reason.
pub(super) const BODY_SNIPPET_LIMIT: usize = 512;

/// Read and discard the body. Returns the number of bytes drained.
pub(super) async fn drain(mut resp: Response) -> u64 {
    let mut drained = 0u64;
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => drained += chunk.len() as u64,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("response body drain: {}", e);
                break;
            }
        }
    }
    drained
}

/// Read the whole body, keeping at most `limit` bytes as lossy UTF-8.
pub(super) async fn read_snippet(mut resp: Response, limit: usize) -> String {
    let mut kept: Vec<u8> = Vec::new();
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..room.min(chunk.len())]);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("response body read: {}", e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&kept).trim().to_string()
}
