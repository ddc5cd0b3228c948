//! Server-sent events line reader shared by the HTTP backends

use futures::stream::Stream;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;

/// Wrap a streaming HTTP body as a buffered reader
pub(crate) fn body_reader(response: reqwest::Response) -> impl AsyncBufRead + Unpin + Send {
    let byte_stream = Box::pin(
        response
            .bytes_stream()
            .map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
    );
    tokio::io::BufReader::new(StreamReader::new(byte_stream))
}

/// Yield the payload of every non-empty `data:` line
pub(crate) fn data_lines<R>(reader: R) -> impl Stream<Item = std::io::Result<String>> + Send
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async_stream::try_stream! {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            yield data.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_data_lines_skip_other_fields() {
        let body: &'static [u8] =
            b"event: message\ndata: {\"a\":1}\n\n: keep-alive\ndata:\ndata:[DONE]\n";
        let lines: Vec<String> = data_lines(body)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }
}
