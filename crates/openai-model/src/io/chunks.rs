#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// Reading the body stream failed midway.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    /// What the transport reported.
    pub reason: String,
    /// Bytes delivered before the failure.
    pub received: usize,
}

enum Source {
    Http(Response),
    #[cfg(test)]
    Scripted(VecDeque<Result<Bytes, String>>),
}

/// Pulls the body of a response one chunk at a time.
pub struct Chunks {
    source: Source,
    received: usize,
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Self::with_source(Source::Http(response))
    }

    /// Replays `chunks` in order, failing where an `Err` is scripted.
    #[cfg(test)]
    pub fn scripted<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes, String>>,
    {
        Self::with_source(Source::Scripted(chunks.into_iter().collect()))
    }

    #[cfg(test)]
    pub fn from_vec_deque(chunks: VecDeque<Bytes>) -> Self {
        Self::scripted(chunks.into_iter().map(Ok))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            received: 0,
        }
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let next = match &mut self.source {
            Source::Http(response) => {
                response.chunk().await.map_err(|err| err.to_string())
            }
            #[cfg(test)]
            Source::Scripted(chunks) => chunks.pop_front().transpose(),
        };
        match next {
            Ok(chunk) => {
                self.received += chunk.as_ref().map_or(0, Bytes::len);
                Ok(chunk)
            }
            Err(reason) => Err(Error {
                reason,
                received: self.received,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_reports_progress() {
        let mut chunks = Chunks::scripted([
            Ok(Bytes::from_static(b"data: ")),
            Ok(Bytes::from_static(b"hi\n\n")),
            Err("connection reset".to_owned()),
        ]);
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "data: ");
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "hi\n\n");
        assert_eq!(
            chunks.next_chunk().await.unwrap_err(),
            Error {
                reason: "connection reset".to_owned(),
                received: 10,
            }
        );
        assert_eq!(chunks.next_chunk().await.unwrap(), None);
    }
}
