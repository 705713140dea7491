//! gzip-transparent input files with rewind support.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{BundleError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A source that can be re-read from its first byte.
pub trait Rewind: Read {
    fn rewind(&mut self) -> io::Result<()>;
}

impl<T: AsRef<[u8]>> Rewind for Cursor<T> {
    fn rewind(&mut self) -> io::Result<()> {
        self.set_position(0);
        Ok(())
    }
}

enum Decoder {
    Raw(File),
    Gzip(MultiGzDecoder<File>),
}

/// One opened input file.
///
/// Decompression is opportunistic: files starting with the gzip magic bytes
/// are decoded, anything else is read as-is from offset 0.
pub struct BundleFile {
    path: PathBuf,
    gzipped: bool,
    inner: Option<Decoder>,
}

impl BundleFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| BundleError::Open {
            path: path.clone(),
            source,
        };

        let mut file = File::open(&path).map_err(open_err)?;
        let gzipped = sniff_gzip(&mut file).map_err(open_err)?;
        file.seek(SeekFrom::Start(0)).map_err(open_err)?;

        let inner = if gzipped {
            Decoder::Gzip(MultiGzDecoder::new(file))
        } else {
            Decoder::Raw(file)
        };

        Ok(Self {
            path,
            gzipped,
            inner: Some(inner),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_gzipped(&self) -> bool {
        self.gzipped
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Releases the file handle. Further reads fail.
    pub fn close(&mut self) {
        self.inner = None;
    }
}

impl Rewind for BundleFile {
    /// Seeks back to the first byte and resets the decompression state.
    fn rewind(&mut self) -> io::Result<()> {
        let decoder = self.inner.take().ok_or_else(closed_error)?;
        let mut file = match decoder {
            Decoder::Raw(file) => file,
            Decoder::Gzip(gz) => gz.into_inner(),
        };
        file.seek(SeekFrom::Start(0))?;

        self.inner = Some(if self.gzipped {
            Decoder::Gzip(MultiGzDecoder::new(file))
        } else {
            Decoder::Raw(file)
        });
        Ok(())
    }
}

impl Read for BundleFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(Decoder::Raw(file)) => file.read(buf),
            Some(Decoder::Gzip(gz)) => gz.read(buf),
            None => Err(closed_error()),
        }
    }
}

impl std::fmt::Debug for BundleFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleFile")
            .field("path", &self.path)
            .field("gzipped", &self.gzipped)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn sniff_gzip(file: &mut File) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..])? {
            0 => return Ok(false),
            n => filled += n,
        }
    }
    Ok(magic == GZIP_MAGIC)
}

fn closed_error() -> io::Error {
    io::Error::other("bundle file is closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_reads_plain_file() {
        let tmp = write_temp(b"{\"resourceType\":\"Patient\"}");
        let mut f = BundleFile::open(tmp.path()).unwrap();
        assert!(!f.is_gzipped());

        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert_eq!(s, "{\"resourceType\":\"Patient\"}");
    }

    #[test]
    fn test_reads_gzipped_file_transparently() {
        let tmp = write_temp(&gzip(b"line one\nline two\n"));
        let mut f = BundleFile::open(tmp.path()).unwrap();
        assert!(f.is_gzipped());

        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert_eq!(s, "line one\nline two\n");
    }

    #[test]
    fn test_rewind_restarts_decompression() {
        let tmp = write_temp(&gzip(b"abcdef"));
        let mut f = BundleFile::open(tmp.path()).unwrap();

        let mut head = [0u8; 3];
        f.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"abc");

        f.rewind().unwrap();
        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert_eq!(s, "abcdef");
    }

    #[test]
    fn test_short_file_is_not_gzip() {
        let tmp = write_temp(b"{");
        let mut f = BundleFile::open(tmp.path()).unwrap();
        assert!(!f.is_gzipped());
        let mut s = String::new();
        f.read_to_string(&mut s).unwrap();
        assert_eq!(s, "{");
    }

    #[test]
    fn test_closed_file_fails_reads() {
        let tmp = write_temp(b"data");
        let mut f = BundleFile::open(tmp.path()).unwrap();
        f.close();
        assert!(f.is_closed());
        assert!(f.read(&mut [0u8; 4]).is_err());
        assert!(f.rewind().is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = BundleFile::open("/definitely/not/here.ndjson").unwrap_err();
        assert!(matches!(err, BundleError::Open { .. }));
    }
}
