//! Output sink: a file, optionally wrapped in gzip or a single-entry zip.
//!
//! The sink owns both the compression layer and the file. [`OutputSink::finish`]
//! finalizes the compression framing first and then flushes the file; the
//! first failure is reported but the later steps still run. Dropping an
//! unfinished sink does the same on a best-effort basis, so early returns
//! never leak a half-open file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::error::{CompressionStage, ExportError, ExportResult};
use crate::options::Compression;

const BUFFER_SIZE: usize = 64 * 1024;
const GZIP_SUFFIX: &str = ".gz";
const ZIP_SUFFIX: &str = ".zip";
const DEFAULT_MEMBER: &str = "export";

/// Final location of the artifact: gzip output gets `.gz` appended unless the
/// caller already supplied it.
pub fn artifact_path(path: &Path, compression: Compression) -> PathBuf {
    match compression {
        Compression::Gzip if !has_suffix(&path.to_string_lossy(), GZIP_SUFFIX) => {
            let mut os = path.as_os_str().to_owned();
            os.push(GZIP_SUFFIX);
            PathBuf::from(os)
        }
        _ => path.to_path_buf(),
    }
}

/// Name of the single zip member: the output's base name without `.zip`,
/// with the format extension appended if missing.
pub fn archive_member_name(path: &Path, extension: &str) -> String {
    let mut base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if has_suffix(&base, ZIP_SUFFIX) {
        base.truncate(base.len() - ZIP_SUFFIX.len());
    }
    if base.is_empty() {
        base = DEFAULT_MEMBER.to_string();
    }
    let ext = format!(".{extension}");
    if !has_suffix(&base, &ext) {
        base.push_str(&ext);
    }
    base
}

fn has_suffix(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

enum Layer {
    Plain(File),
    Gzip(GzEncoder<File>),
    Zip(ZipWriter<File>),
}

impl Layer {
    fn open(file: File, compression: Compression, member: &str) -> ExportResult<Self> {
        match compression {
            Compression::None => Ok(Layer::Plain(file)),
            Compression::Gzip => Ok(Layer::Gzip(GzEncoder::new(
                file,
                flate2::Compression::default(),
            ))),
            Compression::Zip => {
                let mut zip = ZipWriter::new(file);
                let options = FileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated)
                    .large_file(true);
                zip.start_file(member, options)
                    .map_err(|e| ExportError::Compression {
                        stage: CompressionStage::Open,
                        source: io::Error::other(e),
                    })?;
                Ok(Layer::Zip(zip))
            }
        }
    }

    /// Finalize compression, then flush and sync the file so errors the OS
    /// defers until close are reported here.
    fn close(self) -> ExportResult<()> {
        let close_err = |source| ExportError::Compression {
            stage: CompressionStage::Close,
            source,
        };
        match self {
            Layer::Plain(file) => sync(file).map_err(ExportError::Io),
            Layer::Gzip(enc) => {
                let finalized = enc.finish().map_err(close_err)?;
                sync(finalized).map_err(ExportError::Io)
            }
            Layer::Zip(mut zip) => {
                let file = zip.finish().map_err(|e| close_err(io::Error::other(e)))?;
                sync(file).map_err(ExportError::Io)
            }
        }
    }
}

fn sync(mut file: File) -> io::Result<()> {
    file.flush()?;
    match file.sync_all() {
        // Pipes and character devices cannot be synced.
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

impl Write for Layer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Layer::Plain(w) => w.write(buf),
            Layer::Gzip(w) => w.write(buf),
            Layer::Zip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Layer::Plain(w) => w.flush(),
            Layer::Gzip(w) => w.flush(),
            Layer::Zip(w) => w.flush(),
        }
    }
}

/// Exclusively owned, append-only destination of one export.
pub struct OutputSink {
    writer: Option<BufWriter<Layer>>,
    path: PathBuf,
    compression: Compression,
}

impl OutputSink {
    /// Create the file (and compression layer) for `path`. `extension` names
    /// the format, used for the zip member.
    pub fn create(path: &Path, compression: Compression, extension: &str) -> ExportResult<Self> {
        let path = artifact_path(path, compression);
        let file = File::create(&path)?;
        let member = archive_member_name(&path, extension);
        // On failure the file handle is dropped together with the layer.
        let layer = Layer::open(file, compression, &member)?;

        tracing::debug!(
            "Opened output {} (compression={})",
            path.display(),
            compression
        );

        Ok(Self {
            writer: Some(BufWriter::with_capacity(BUFFER_SIZE, layer)),
            path,
            compression,
        })
    }

    /// Path of the artifact actually written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Flush buffers, finalize compression and release the file.
    pub fn finish(mut self) -> ExportResult<()> {
        match self.writer.take() {
            Some(writer) => close_writer(writer),
            None => Ok(()),
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<Layer>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "output sink is closed"))
    }
}

fn close_writer(writer: BufWriter<Layer>) -> ExportResult<()> {
    let (layer, flushed) = match writer.into_inner() {
        Ok(layer) => (layer, Ok(())),
        Err(err) => {
            let (error, writer) = err.into_parts();
            (writer.into_parts().0, Err(ExportError::Io(error)))
        }
    };
    let closed = layer.close();
    flushed.and(closed)
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take()
            && let Err(e) = close_writer(writer)
        {
            tracing::warn!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}
