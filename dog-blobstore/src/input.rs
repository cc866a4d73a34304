use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

use crate::{BlobResult, ContentType};

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Input for storing a blob in a [`BlobStore`](crate::BlobStore).
///
/// Bundles the blob data with its size (when known in advance) and its content
/// type. The data handle is carried as-is; it is consumed by the store, never
/// by the descriptor itself.
pub struct BlobInput<S = ByteStream> {
    data: S,
    size: Option<u64>,
    content_type: ContentType,
}

impl<S> BlobInput<S> {
    /// Create an input with content type `application/octet-stream`.
    ///
    /// `size` is the number of bytes `data` will yield, or `None` if it is not
    /// known in advance.
    pub fn new(data: S, size: Option<u64>) -> Self {
        Self::with_content_type(data, size, ContentType::octet_stream())
    }

    /// Create an input with an explicit content type
    pub fn with_content_type(data: S, size: Option<u64>, content_type: ContentType) -> Self {
        Self {
            data,
            size,
            content_type,
        }
    }

    /// Create an input, parsing the content type from a string.
    ///
    /// Fails with [`BlobError::InvalidContentType`](crate::BlobError::InvalidContentType)
    /// if the string is not a valid MIME type.
    pub fn create(data: S, size: Option<u64>, content_type: &str) -> BlobResult<Self> {
        let content_type = ContentType::parse(content_type)?;
        Ok(Self::with_content_type(data, size, content_type))
    }

    /// The blob data
    pub fn data(&self) -> &S {
        &self.data
    }

    /// The size of the blob data in bytes, if known
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The content type of the blob data
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Take the data handle, dropping the metadata
    pub fn into_data(self) -> S {
        self.data
    }

    /// Split into data, size and content type
    pub fn into_parts(self) -> (S, Option<u64>, ContentType) {
        (self.data, self.size, self.content_type)
    }
}

impl BlobInput<ByteStream> {
    /// Create an input from an in-memory payload; the size is the payload length
    pub fn from_bytes<B: Into<Bytes>>(bytes: B, content_type: Option<ContentType>) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::with_content_type(
            single_chunk(bytes),
            Some(size),
            content_type.unwrap_or_default(),
        )
    }
}

impl<S> std::fmt::Debug for BlobInput<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobInput")
            .field("size", &self.size)
            .field("content_type", &self.content_type.to_string())
            .finish_non_exhaustive()
    }
}

/// A stream yielding one chunk
pub fn single_chunk(bytes: Bytes) -> ByteStream {
    Box::pin(futures_util::stream::once(async move { Ok::<_, std::io::Error>(bytes) }))
}

/// A stream yielding the given chunks in order
pub fn chunked<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures_util::stream::iter(chunks.into_iter().map(Ok::<Bytes, std::io::Error>)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[test]
    fn test_new_defaults_to_octet_stream() {
        let input = BlobInput::new(single_chunk(Bytes::from_static(b"abc")), Some(3));
        assert_eq!(input.size(), Some(3));
        assert_eq!(input.content_type().to_string(), "application/octet-stream");
    }

    #[test]
    fn test_unknown_size() {
        let input = BlobInput::new(single_chunk(Bytes::new()), None);
        assert_eq!(input.size(), None);
    }

    #[test]
    fn test_create_rejects_malformed_content_type() {
        let result = BlobInput::create(single_chunk(Bytes::new()), None, "not a mime type");
        assert!(matches!(result, Err(crate::BlobError::InvalidContentType { .. })));
    }

    #[test]
    fn test_generic_data_handle() {
        let input = BlobInput::create(vec![1u8, 2, 3], Some(3), "image/png").unwrap();
        assert_eq!(input.data(), &vec![1, 2, 3]);

        let (data, size, content_type) = input.into_parts();
        assert_eq!(data, vec![1, 2, 3]);
        assert_eq!(size, Some(3));
        assert_eq!(content_type.essence(), "image/png");
    }

    #[tokio::test]
    async fn test_from_bytes() {
        let input = BlobInput::from_bytes("hello", Some(ContentType::text_plain()));
        assert_eq!(input.size(), Some(5));
        assert_eq!(input.content_type().essence(), "text/plain");

        let chunks: Vec<Bytes> = input.into_data().try_collect().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"hello")]);
    }

    #[tokio::test]
    async fn test_chunked_preserves_order() {
        let stream = chunked(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }
}
