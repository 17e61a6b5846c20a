//! Chunk packaging — splits an oversized file into self-contained ZIP
//! containers.
//!
//! Each container is a single-entry deflate archive holding one contiguous
//! byte range of the source file.  Entry names carry the target filename and
//! a 1-based sequence number, so any subset of containers can be unpacked
//! independently and the full set concatenates back to the original bytes.
//!
//! Slice length is `ceiling - ceiling / 8`: the reserved eighth bounds
//! archive metadata plus worst-case deflate growth on incompressible
//! payloads, keeping every container under the ceiling.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use thiserror::Error;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Fraction of the ceiling reserved for container overhead.
const OVERHEAD_DIVISOR: u64 = 8;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("cannot read source file: {0}")]
    Read(#[from] std::io::Error),

    #[error("cannot build container: {0}")]
    Archive(String),

    #[error("container for part {seq} is {size} bytes, over the {ceiling}-byte ceiling")]
    Oversize { seq: usize, size: u64, ceiling: u64 },
}

/// One compressed, independently extractable slice of the source file.
#[derive(Debug, Clone)]
pub struct ChunkContainer {
    /// 1-based position in the reassembly order.
    pub seq: usize,
    /// Filename exposed to the delivery layer: `{name}.part{seq}.zip`.
    pub filename: String,
    /// Complete archive bytes.
    pub data: Vec<u8>,
}

/// Raw byte length of each chunk for a given ceiling.
pub fn slice_len(ceiling: u64) -> u64 {
    ceiling - ceiling / OVERHEAD_DIVISOR
}

/// Split the file at `path` into containers of at most `ceiling` bytes each.
///
/// Containers come back in reassembly order, sequence numbers contiguous
/// from 1.  All-or-nothing: any read or archive error aborts the operation
/// and discards containers already built.
///
/// Callers have already classified the file as oversized; a smaller file is
/// still packed correctly (into a single container), which is what the
/// driver's payload-too-large fallback relies on.
pub fn pack(path: &Path, target_name: &str, ceiling: u64) -> Result<Vec<ChunkContainer>, PackageError> {
    let slice = slice_len(ceiling) as usize;
    if slice == 0 {
        return Err(PackageError::Archive(format!(
            "ceiling {ceiling} leaves no room for payload"
        )));
    }

    let mut source = File::open(path)?;
    let mut containers = Vec::new();
    let mut seq = 0usize;

    loop {
        let chunk = read_up_to(&mut source, slice)?;
        if chunk.is_empty() {
            break;
        }
        seq += 1;
        let container = build_container(target_name, seq, &chunk)?;
        let size = container.data.len() as u64;
        if size > ceiling {
            return Err(PackageError::Oversize { seq, size, ceiling });
        }
        containers.push(container);
    }

    Ok(containers)
}

/// Read up to `want` bytes, stopping early only at end of file.
fn read_up_to(source: &mut File, want: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

fn build_container(
    target_name: &str,
    seq: usize,
    chunk: &[u8],
) -> Result<ChunkContainer, PackageError> {
    let entry_name = format!("{target_name}.part{seq}");
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(entry_name.as_str(), options)
        .map_err(|e| PackageError::Archive(e.to_string()))?;
    writer
        .write_all(chunk)
        .map_err(|e| PackageError::Archive(e.to_string()))?;
    let cursor = writer
        .finish()
        .map_err(|e| PackageError::Archive(e.to_string()))?;

    Ok(ChunkContainer {
        filename: format!("{entry_name}.zip"),
        seq,
        data: cursor.into_inner(),
    })
}
