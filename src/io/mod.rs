/*! Record codec: shard readers and record sinks.

Shards are gzipped WARC files. Reading yields only `conversion`
records, decoded to UTF-8 (lossy on invalid bytes); writing produces
`conversion` records carrying a target URI and a UTF-8 payload.
!*/
pub mod reader;
pub mod writer;

pub use reader::Shard;
pub use writer::{conversion_sink, response_sink, ConversionSink, ResponseSink};

/// An extracted plain-text record.
///
/// Records are immutable once emitted; workers never carry state from
/// one record to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub url: String,
    pub id: String,
    pub content: String,
}

impl TextRecord {
    pub fn new(url: String, id: String, content: String) -> Self {
        Self { url, id, content }
    }
}
