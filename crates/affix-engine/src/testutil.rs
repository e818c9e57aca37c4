//! In-memory stream and sink fakes shared by unit tests.

use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use image::{Rgba, RgbaImage};

use crate::encode::{OutputSpec, encode};
use crate::session::{ExclusiveProcessing, MediaRegistrar, OutputSink, SinkFactory};
use crate::source::{ImageRef, ImageStream, StreamProvider};

/// Encode a solid-color PNG.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    encode(
        RgbaImage::from_pixel(width, height, Rgba(rgba)),
        OutputSpec::png(),
        &mut bytes,
    )
    .expect("encode test png");
    bytes
}

/// Encode a solid-color baseline JPEG.
pub fn jpeg_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    encode(
        RgbaImage::from_pixel(width, height, Rgba(rgba)),
        OutputSpec::jpeg(90),
        &mut bytes,
    )
    .expect("encode test jpeg");
    bytes
}

#[derive(Default)]
pub struct MemoryStreams {
    files: Mutex<HashMap<ImageRef, Vec<u8>>>,
    opens: AtomicUsize,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl MemoryStreams {
    /// Streams whose every `open` blocks until the returned sender sends once.
    /// Dropping the sender releases all waiters.
    pub fn gated() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let streams = Self {
            gate: Some(Mutex::new(rx)),
            ..Self::default()
        };
        (streams, tx)
    }

    pub fn insert(&self, id: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(ImageRef::new(id), bytes);
    }

    /// Number of streams opened so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl StreamProvider for MemoryStreams {
    fn open(&self, image: &ImageRef) -> io::Result<Box<dyn ImageStream>> {
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        let bytes = files
            .get(image)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, image.to_string()))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

/// Shared byte buffer handed out as a sink.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink factory keeping every output in memory, keyed by its fake path.
#[derive(Default)]
pub struct MemorySinks {
    outputs: Mutex<Vec<(PathBuf, SharedBuffer)>>,
    discarded: Mutex<Vec<PathBuf>>,
    fail_create: bool,
    fail_writes: bool,
    panic_on_create: bool,
}

impl MemorySinks {
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Sinks open fine but every write fails.
    pub fn broken_writer() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// `create` panics, taking the worker thread down with it.
    pub fn panicking() -> Self {
        Self {
            panic_on_create: true,
            ..Self::default()
        }
    }

    pub fn output(&self, path: &Path) -> Option<Vec<u8>> {
        self.outputs
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, buf)| buf.bytes())
    }

    pub fn created(&self) -> usize {
        self.outputs.lock().unwrap().len()
    }

    pub fn discarded(&self) -> Vec<PathBuf> {
        self.discarded.lock().unwrap().clone()
    }
}

impl SinkFactory for MemorySinks {
    fn create(&self, extension: &str) -> io::Result<OutputSink> {
        assert!(!self.panic_on_create, "sink factory blew up");
        if self.fail_create {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        let mut outputs = self.outputs.lock().unwrap();
        let path = PathBuf::from(format!("memory/AFFIX_{}{extension}", outputs.len()));
        let buffer = SharedBuffer::default();
        outputs.push((path.clone(), buffer.clone()));
        if self.fail_writes {
            return Ok(OutputSink::new(path, BrokenWriter));
        }
        Ok(OutputSink::new(path, buffer))
    }

    fn discard(&self, path: &Path) {
        self.discarded.lock().unwrap().push(path.to_path_buf());
    }
}

struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Counts exclusive-processing brackets and records registered outputs.
#[derive(Default)]
pub struct Hooks {
    begun: AtomicUsize,
    ended: AtomicUsize,
    registered: Mutex<Vec<PathBuf>>,
}

impl Hooks {
    pub fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.registered.lock().unwrap().clone()
    }
}

impl ExclusiveProcessing for Hooks {
    fn begin(&self) {
        self.begun.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}

impl MediaRegistrar for Hooks {
    fn register(&self, path: &Path) {
        self.registered.lock().unwrap().push(path.to_path_buf());
    }
}
