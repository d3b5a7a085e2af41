// Chunked JSON streaming utilities
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;

/// Stream every item as one chunk: a 4-byte big-endian length followed by the JSON
/// payload, each payload Brotli-compressed on its own when `compress` is set.
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |item| async move { serialize_chunk(&item, compress).await });

    // Chunks are compressed individually, so no Content-Encoding on the response.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn serialize_chunk<T: Serialize>(item: &T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(item)?;

    let payload = if compress {
        brotli_compress(json).await?
    } else {
        json
    };

    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "chunk too large"))?;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Stream `first`, then every value published on `updates` until its sender is gone.
pub fn stream_from_watch<T>(
    first: T,
    updates: Option<watch::Receiver<T>>,
    compress: bool,
) -> Response<Body>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let stream = async_stream::stream! {
        yield first;
        if let Some(mut rx) = updates {
            while rx.changed().await.is_ok() {
                let item = rx.borrow_and_update().clone();
                yield item;
            }
        }
    };

    match chunked_json_stream(stream, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Split a body produced by `chunked_json_stream` (uncompressed) back into payloads.
#[cfg(test)]
pub fn split_chunks(mut body: &[u8]) -> Vec<serde_json::Value> {
    use bytes::Buf;
    let mut out = Vec::new();
    while body.remaining() >= 4 {
        let len = body.get_u32() as usize;
        out.push(serde_json::from_slice(&body[..len]).unwrap());
        body.advance(len);
    }
    out
}
