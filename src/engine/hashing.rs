//! File and stream hashing stages

use anyhow::Result;
use blake3::Hasher;
use memmap2::Mmap;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::Pipe;
use crate::engine::tools::scan_lines;
use crate::utils::config::HashingConsts;

/// Digest used by the `*_sums` stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashKind {
    Sha256,
    Blake3,
}

/// Hex BLAKE3 of a file. Uses memory-mapped I/O for files above threshold, chunked reading otherwise.
pub fn blake3_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut hasher = Hasher::new();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file)? };
        hasher.update(&mmap);
    } else {
        let mut reader = io::BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Hex SHA-256 of everything `r` yields.
pub fn sha256_reader<R: Read + ?Sized>(r: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    io::copy(r, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

/// Hash the file at `path`, or None if it cannot be opened. Read errors after opening
/// are real failures.
fn hash_path(kind: HashKind, path: &str) -> Result<Option<String>> {
    let path = Path::new(path);
    if File::open(path).is_err() {
        return Ok(None);
    }
    let digest = match kind {
        HashKind::Sha256 => sha256_file(path)?,
        HashKind::Blake3 => blake3_file(path)?,
    };
    Ok(Some(digest))
}

fn hash_sums_serial(
    kind: HashKind,
    r: &mut (dyn Read + Send),
    w: &mut (dyn Write + Send),
) -> Result<()> {
    scan_lines(r, |path| {
        if let Some(digest) = hash_path(kind, path)? {
            writeln!(w, "{digest}")?;
        }
        Ok(true)
    })
}

/// Batch mode: all names are known up front, so hash them in parallel and emit in input order.
fn hash_sums_parallel(
    kind: HashKind,
    r: &mut (dyn Read + Send),
    w: &mut (dyn Write + Send),
) -> Result<()> {
    let mut paths = Vec::new();
    scan_lines(r, |path| {
        paths.push(path.to_string());
        Ok(true)
    })?;
    let digests = paths
        .par_iter()
        .map(|path| hash_path(kind, path))
        .collect::<Result<Vec<_>>>()?;
    for digest in digests.into_iter().flatten() {
        writeln!(w, "{digest}")?;
    }
    Ok(())
}

impl Pipe {
    /// Treat each line as a file path and output the file's digest, one per line. Files
    /// that cannot be opened are skipped.
    pub fn hash_sums(self, kind: HashKind) -> Pipe {
        if self.is_streaming() {
            self.filter(move |r, w| hash_sums_serial(kind, r, w))
        } else {
            self.filter(move |r, w| hash_sums_parallel(kind, r, w))
        }
    }

    /// [`Pipe::hash_sums`] with SHA-256.
    pub fn sha256_sums(self) -> Pipe {
        self.hash_sums(HashKind::Sha256)
    }

    /// [`Pipe::hash_sums`] with BLAKE3.
    pub fn blake3_sums(self) -> Pipe {
        self.hash_sums(HashKind::Blake3)
    }
}
