//! Dump loading
//!
//! Turns a dump into a `GraphManager`. Three sources are accepted:
//!
//! - a filesystem path
//! - any open `Read` stream
//! - an in-memory sequence of record strings
//!
//! Paths and streams are sniffed for the gzip magic (`1f 8b`) and
//! decompressed on the fly; the file name is never consulted. Records are
//! decoded one line at a time, so the raw text is never held in memory.
//! The first malformed record aborts the load.

mod progress;

use crate::errors::{LoadError, LoadResult};
use crate::graph::{parse_record_bytes, GraphManager};
use flate2::read::MultiGzDecoder;
use progress::LoadProgress;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const READ_BUFFER: usize = 256 * 1024;

/// Options for `load`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Draw a progress indicator on stderr
    pub show_progress: bool,
}

impl LoadOptions {
    pub fn with_progress(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

/// Where a dump comes from
pub enum DumpSource<'a> {
    Path(PathBuf),
    Reader(Box<dyn Read + 'a>),
    /// One record per entry
    Records(Vec<Cow<'a, str>>),
}

impl<'a> DumpSource<'a> {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DumpSource::Path(path.into())
    }

    pub fn reader(reader: impl Read + 'a) -> Self {
        DumpSource::Reader(Box::new(reader))
    }

    pub fn records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'a, str>>,
    {
        DumpSource::Records(records.into_iter().map(Into::into).collect())
    }
}

impl From<PathBuf> for DumpSource<'_> {
    fn from(path: PathBuf) -> Self {
        DumpSource::Path(path)
    }
}

impl From<&Path> for DumpSource<'_> {
    fn from(path: &Path) -> Self {
        DumpSource::Path(path.to_path_buf())
    }
}

/// Load a whole dump. Either every record loads or an error is returned.
pub fn load(source: DumpSource<'_>, options: &LoadOptions) -> LoadResult<GraphManager> {
    let start = Instant::now();
    let graph = match source {
        DumpSource::Path(path) => {
            let file = File::open(&path).map_err(|source| LoadError::Open {
                path: path.clone(),
                source,
            })?;
            debug!("Loading dump from {}", path.display());
            load_stream(file, options)?
        }
        DumpSource::Reader(reader) => load_stream(reader, options)?,
        DumpSource::Records(records) => {
            let progress = LoadProgress::new(options.show_progress, Some(records.len()));
            let mut graph = GraphManager::with_capacity(records.len());
            for (idx, record) in records.iter().enumerate() {
                ingest(&mut graph, record.as_bytes(), idx + 1)?;
                progress.record(idx + 1);
            }
            finish(&mut graph, &progress);
            graph
        }
    };

    let stats = graph.load_stats();
    if stats.duplicates > 0 {
        warn!(
            "{} records reused an earlier address (last one kept)",
            stats.duplicates
        );
    }
    info!(
        "Loaded {} objects from {} records in {:.2?}",
        graph.len(),
        stats.records,
        start.elapsed()
    );
    Ok(graph)
}

/// Convenience for the common case of a dump file on disk
pub fn load_path(path: impl AsRef<Path>, options: &LoadOptions) -> LoadResult<GraphManager> {
    load(DumpSource::from(path.as_ref()), options)
}

fn load_stream<R: Read>(reader: R, options: &LoadOptions) -> LoadResult<GraphManager> {
    let mut input = open_dump(reader)?;
    let progress = LoadProgress::new(options.show_progress, None);
    let mut graph = GraphManager::new();
    // raw bytes, so bad UTF-8 is reported against its line
    let mut line = Vec::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        ingest(&mut graph, &line, line_no)?;
        progress.record(line_no);
    }
    finish(&mut graph, &progress);
    Ok(graph)
}

/// Wrap `reader` in a buffered line source, inflating it if it is gzip.
pub(crate) fn open_dump<'a, R: Read + 'a>(mut reader: R) -> io::Result<Box<dyn BufRead + 'a>> {
    let mut head = [0u8; 2];
    let filled = read_up_to(&mut reader, &mut head)?;
    let is_gzip = head[..filled] == GZIP_MAGIC;
    let stream = Cursor::new(head[..filled].to_vec()).chain(reader);
    if is_gzip {
        debug!("Detected gzip stream");
        let inflated = MultiGzDecoder::new(BufReader::with_capacity(READ_BUFFER, stream));
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, inflated)))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, stream)))
    }
}

/// Fill `buf` unless the stream ends first; returns bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn ingest(graph: &mut GraphManager, text: &[u8], line: usize) -> LoadResult<()> {
    let text = text.trim_ascii();
    if text.is_empty() {
        return Ok(());
    }
    let record = parse_record_bytes(text).map_err(|source| LoadError::MalformedRecord { line, source })?;
    graph.insert_record(record);
    Ok(())
}

fn finish(graph: &mut GraphManager, progress: &LoadProgress) {
    graph.release_excess_capacity();
    let stats = graph.load_stats();
    progress.finish(graph.len(), stats.duplicates);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::EXAMPLE_DUMP;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(6));
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_load_one() {
        let graph = load(
            DumpSource::records([r#"{"address": 1234, "type": "int", "size": 12, "value": 10, "refs": []}"#]),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(graph.addresses(), vec![1234]);
        assert_eq!(graph.type_str(&graph[1234]), "int");
    }

    #[test]
    fn test_plain_stream() {
        let text = EXAMPLE_DUMP.join("\n") + "\n";
        let graph = load(DumpSource::reader(text.as_bytes()), &LoadOptions::default()).unwrap();
        assert_eq!(graph.len(), 7);
        assert_eq!(graph.addresses(), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_gzip_stream_detected_by_content() {
        let text = EXAMPLE_DUMP.join("\n");
        let compressed = gzip(&text);
        let graph = load(DumpSource::reader(compressed.as_slice()), &LoadOptions::default()).unwrap();
        assert_eq!(graph.len(), 7);
        assert_eq!(graph[6].length(), Some(5));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let text = format!("{}\r\n\r\n{}\r\n\n", EXAMPLE_DUMP[0], EXAMPLE_DUMP[2]);
        let graph = load(DumpSource::reader(text.as_bytes()), &LoadOptions::default()).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.load_stats().records, 2);
    }

    #[test]
    fn test_empty_and_tiny_streams() {
        let graph = load(DumpSource::reader(&b""[..]), &LoadOptions::default()).unwrap();
        assert!(graph.is_empty());
        let graph = load(DumpSource::reader(&b"\n"[..]), &LoadOptions::default()).unwrap();
        assert!(graph.is_empty());
        // shorter than the gzip magic
        let err = load(DumpSource::reader(&b"{"[..]), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_malformed_record_reports_line() {
        let text = format!("{}\n{}\n{{\"address\": 9}}\n", EXAMPLE_DUMP[0], EXAMPLE_DUMP[1]);
        let err = load(DumpSource::reader(text.as_bytes()), &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::MalformedRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_malformed_record() {
        let mut text = format!("{}\n", EXAMPLE_DUMP[0]).into_bytes();
        text.extend_from_slice(b"{\"address\": 9, \"type\": \"\xff\xfe\", \"size\": 1}\n");
        let err = load(DumpSource::reader(text.as_slice()), &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::MalformedRecord { line, source } => {
                assert_eq!(line, 2);
                assert!(source.is_syntax());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_gzip_is_io_error() {
        let mut compressed = gzip(&EXAMPLE_DUMP.join("\n"));
        let mid = compressed.len() / 2;
        compressed.truncate(mid);
        let err = load(DumpSource::reader(compressed.as_slice()), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)), "got {err}");
    }

    #[test]
    fn test_missing_file() {
        let err = load_path("/nonexistent/heapscope/dump.json", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }

    #[test]
    fn test_duplicate_address_last_write_wins() {
        let graph = load(
            DumpSource::records([
                r#"{"address": 1, "type": "int", "size": 12}"#,
                r#"{"address": 2, "type": "str", "size": 30}"#,
                r#"{"address": 1, "type": "float", "size": 16}"#,
            ]),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.type_str(&graph[1]), "float");
        assert_eq!(graph[1].size(), 16);
        assert_eq!(
            graph.load_stats(),
            crate::graph::LoadStats {
                records: 3,
                duplicates: 1
            }
        );
    }

    #[test]
    fn test_progress_does_not_change_result() {
        let quiet = load(DumpSource::records(EXAMPLE_DUMP), &LoadOptions::default()).unwrap();
        let loud = load(DumpSource::records(EXAMPLE_DUMP), &LoadOptions::with_progress(true)).unwrap();
        assert_eq!(quiet.addresses(), loud.addresses());
        for addr in quiet.addresses() {
            assert_eq!(quiet[addr].ref_list(), loud[addr].ref_list());
        }
    }
}
