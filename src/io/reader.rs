//! Gzipped WARC shard reading.
use std::{fs::File, io::BufReader, path::Path};

use crate::error::Error;
use crate::io::TextRecord;
use flate2::read::MultiGzDecoder;
use std::io::BufRead;
use warc::{BufferedBody, Record, RecordIter, WarcHeader, WarcReader};

/// Shard instance, generic over reader type.
///
/// Shards coming out of a crawl are gzipped (often with one gzip
/// member per record) and need a multi-member decoder such as
/// [MultiGzDecoder].
pub struct Shard<T: BufRead> {
    iter: RecordIter<T>,
}

/// Shard reader using [MultiGzDecoder] over a [File].
impl Shard<BufReader<MultiGzDecoder<File>>> {
    /// Create a new reader from a gzipped WARC file.
    pub fn from_path_gzip<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let gzip_file = File::open(path)?;
        let gzip_stream = MultiGzDecoder::new(gzip_file);
        let bufreader = BufReader::new(gzip_stream);

        Ok(Self::new(bufreader))
    }

    /// Iterator over the shard's `conversion` records only.
    pub fn text_records(self) -> TextRecords<BufReader<MultiGzDecoder<File>>> {
        TextRecords { inner: self }
    }
}

impl<T: BufRead> Shard<T> {
    pub fn new(reader: T) -> Self {
        Self {
            iter: WarcReader::new(reader).iter_records(),
        }
    }
}

impl<R: BufRead> Iterator for Shard<R> {
    type Item = Result<Record<BufferedBody>, Error>;
    fn next(&mut self) -> Option<Self::Item> {
        match self.iter.next() {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => Some(Err(Error::Warc(e))),
            None => None,
        }
    }
}

/// Iterator adapter keeping `conversion` records and decoding their
/// payload.
///
/// Any other record type is silently skipped; read errors are yielded
/// so callers can decide between logging and aborting. Payload bytes
/// that are not valid UTF-8 are decoded with replacement characters.
pub struct TextRecords<R: BufRead> {
    inner: Shard<R>,
}

impl<R: BufRead> Iterator for TextRecords<R> {
    type Item = Result<TextRecord, Error>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.inner.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };

            let is_conversion = record
                .header(WarcHeader::WarcType)
                .map(|t| t == "conversion")
                .unwrap_or(false);
            if !is_conversion {
                continue;
            }

            let url = record
                .header(WarcHeader::TargetURI)
                .map(|u| u.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let id = record.warc_id().to_string();
            let content = String::from_utf8_lossy(record.body()).into_owned();

            return Some(Ok(TextRecord::new(url, id, content)));
        }
    }
}
