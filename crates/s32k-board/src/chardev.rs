//! Character-stream sinks that UART instances bind to.
//!
//! The board only holds the reference; what the bytes mean is up to the
//! execution engine.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::error::{BoardError, Result};

/// Destination for a UART's transmitted bytes.
pub trait CharBackend: fmt::Debug + Send + Sync {
    /// Short human-readable description (e.g., "stdio", "file:out.log").
    fn label(&self) -> String;

    /// Write bytes to the sink.
    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullBackend;

impl CharBackend for NullBackend {
    fn label(&self) -> String {
        "null".into()
    }

    fn write_bytes(&self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Host standard output.
#[derive(Debug, Default)]
pub struct StdioBackend;

impl CharBackend for StdioBackend {
    fn label(&self) -> String {
        "stdio".into()
    }

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }
}

/// Appends to a host file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileBackend {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl CharBackend for FileBackend {
    fn label(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(bytes)
    }
}

/// Captures bytes in memory.
#[derive(Debug, Default)]
pub struct BufferBackend {
    buf: Mutex<Vec<u8>>,
}

impl BufferBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CharBackend for BufferBackend {
    fn label(&self) -> String {
        "buffer".into()
    }

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(bytes);
        Ok(())
    }
}

/// Textual sink binding as written in machine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialSpec {
    Null,
    Stdio,
    File(PathBuf),
}

impl SerialSpec {
    /// Open the sink this spec names.
    pub fn open(&self) -> Result<Arc<dyn CharBackend>> {
        let backend: Arc<dyn CharBackend> = match self {
            SerialSpec::Null => Arc::new(NullBackend),
            SerialSpec::Stdio => Arc::new(StdioBackend),
            SerialSpec::File(path) => Arc::new(FileBackend::create(path.clone())?),
        };
        Ok(backend)
    }
}

impl FromStr for SerialSpec {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "null" | "none" => Ok(SerialSpec::Null),
            "stdio" => Ok(SerialSpec::Stdio),
            _ => match s.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(SerialSpec::File(PathBuf::from(path))),
                _ => Err(BoardError::invalid(format!(
                    "unrecognized serial binding '{s}' (expected null, stdio, or file:<path>)"
                ))),
            },
        }
    }
}

impl fmt::Display for SerialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialSpec::Null => f.write_str("null"),
            SerialSpec::Stdio => f.write_str("stdio"),
            SerialSpec::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_specs() {
        assert_eq!("null".parse::<SerialSpec>().unwrap(), SerialSpec::Null);
        assert_eq!("stdio".parse::<SerialSpec>().unwrap(), SerialSpec::Stdio);
        assert_eq!(
            "file:uart0.log".parse::<SerialSpec>().unwrap(),
            SerialSpec::File(PathBuf::from("uart0.log"))
        );
        assert!("file:".parse::<SerialSpec>().is_err());
        assert!("tcp:1234".parse::<SerialSpec>().is_err());
        assert_eq!(SerialSpec::File("a.log".into()).to_string(), "file:a.log");
    }

    #[test]
    fn buffer_captures_bytes() {
        let buf = BufferBackend::new();
        buf.write_bytes(b"hello ").unwrap();
        buf.write_bytes(b"board").unwrap();
        assert_eq!(buf.contents(), b"hello board");
    }

    #[test]
    fn file_backend_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uart.log");
        let sink = SerialSpec::File(path.clone()).open().unwrap();
        sink.write_bytes(b"boot\n").unwrap();
        assert!(sink.label().starts_with("file:"));
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), b"boot\n");
    }

    #[test]
    fn null_discards() {
        let sink = SerialSpec::Null.open().unwrap();
        sink.write_bytes(b"ignored").unwrap();
        assert_eq!(sink.label(), "null");
    }
}
