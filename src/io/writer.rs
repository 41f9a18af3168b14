//! WARC record sinks.
//!
//! Sinks are single-writer: one sink owns one output file. The
//! underlying gzip stream is finished when the sink is dropped.
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use warc::{BufferedBody, RawRecordHeader, Record, WarcHeader, WarcWriter};

use crate::error::Error;
use crate::io::TextRecord;

/// Sink for `conversion` records.
pub struct ConversionSink<W> {
    inner: WarcWriter<W>,
}

/// Create a gzip-framed conversion sink at `path`.
pub fn conversion_sink<P: AsRef<Path>>(path: P) -> Result<ConversionSink<impl Write>, Error> {
    Ok(ConversionSink {
        inner: WarcWriter::from_path_gzip(path)?,
    })
}

impl<W: Write> ConversionSink<W> {
    /// Serialize one record, with `WARC-Target-URI` set from the
    /// record's url and the content as UTF-8 payload.
    pub fn write(&mut self, record: &TextRecord) -> Result<(), Error> {
        let body = record.content.as_bytes().to_vec();
        let headers = raw_headers(
            "conversion",
            &record.id,
            vec![
                (WarcHeader::TargetURI, record.url.clone().into_bytes()),
                (WarcHeader::ContentType, b"text/plain".to_vec()),
            ],
            body.len(),
        );

        self.inner.write_raw(headers, &body)?;
        Ok(())
    }
}

/// Sink for `response` records, used when archiving fetched URLs.
///
/// The payload is the raw HTTP message (status line, the original
/// response headers, then the body).
pub struct ResponseSink<W> {
    inner: WarcWriter<W>,
}

/// Create a gzip-framed response sink at `path`.
pub fn response_sink<P: AsRef<Path>>(path: P) -> Result<ResponseSink<impl Write>, Error> {
    Ok(ResponseSink {
        inner: WarcWriter::from_path_gzip(path)?,
    })
}

impl<W: Write> ResponseSink<W> {
    pub fn write(
        &mut self,
        url: &str,
        status_line: &str,
        headers: &[(String, String)],
        content: &[u8],
    ) -> Result<(), Error> {
        let mut body = Vec::with_capacity(content.len() + 256);
        body.extend_from_slice(b"HTTP/1.1 ");
        body.extend_from_slice(status_line.as_bytes());
        body.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            body.extend_from_slice(name.as_bytes());
            body.extend_from_slice(b": ");
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(content);

        let record_id = Record::<BufferedBody>::generate_record_id();
        let raw = raw_headers(
            "response",
            &record_id,
            vec![
                (WarcHeader::TargetURI, url.as_bytes().to_vec()),
                (
                    WarcHeader::ContentType,
                    b"application/http;msgtype=response".to_vec(),
                ),
            ],
            body.len(),
        );

        self.inner.write_raw(raw, &body)?;
        Ok(())
    }
}

fn raw_headers(
    warc_type: &str,
    record_id: &str,
    extra: Vec<(WarcHeader, Vec<u8>)>,
    content_length: usize,
) -> RawRecordHeader {
    let mut headers: HashMap<WarcHeader, Vec<u8>> = vec![
        (WarcHeader::WarcType, warc_type.as_bytes().to_vec()),
        (WarcHeader::RecordID, record_id.as_bytes().to_vec()),
        (
            WarcHeader::ContentLength,
            content_length.to_string().into_bytes(),
        ),
    ]
    .into_iter()
    .collect();
    headers.extend(extra);

    RawRecordHeader {
        version: "1.0".to_owned(),
        headers,
    }
}

#[cfg(test)]
mod tests {
    use crate::io::{Shard, TextRecord};

    use super::conversion_sink;

    #[test]
    fn test_roundtrip_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.warc.gz");

        let records = vec![
            TextRecord::new("http://a".into(), "<urn:uuid:a>".into(), "first".into()),
            TextRecord::new("http://b".into(), "<urn:uuid:b>".into(), "second\nline".into()),
            TextRecord::new("http://c".into(), "<urn:uuid:c>".into(), "third".into()),
        ];

        {
            let mut sink = conversion_sink(&path).unwrap();
            for record in &records {
                sink.write(record).unwrap();
            }
        }

        let read_back: Vec<_> = Shard::from_path_gzip(&path)
            .unwrap()
            .text_records()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(read_back.len(), records.len());
        for (got, expected) in read_back.iter().zip(&records) {
            assert_eq!(got.url, expected.url);
            assert_eq!(got.content, expected.content);
        }
    }
}
