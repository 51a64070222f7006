//! Producers: pipes created from literals, files, directories and process state.
//!
//! Setup failures never panic; they come back as a pipe whose sticky error is set.

use anyhow::Context;
use log::{debug, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Pipe;
use crate::engine::tools::{glob_match, has_glob_chars};

fn lines_to_bytes<I, S>(lines: I) -> Vec<u8>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line.as_ref().as_bytes());
        out.push(b'\n');
    }
    out
}

fn path_lines(paths: Vec<PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

impl Pipe {
    /// Pipe containing exactly `s`.
    pub fn echo(s: impl Into<String>) -> Pipe {
        Pipe::from_reader(io::Cursor::new(s.into().into_bytes()))
    }

    /// Pipe with one line per element. An empty slice gives an empty pipe.
    pub fn slice<I, S>(lines: I) -> Pipe
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Pipe::from_reader(io::Cursor::new(lines_to_bytes(lines)))
    }

    /// Contents of the file at `path`.
    pub fn file(path: impl AsRef<Path>) -> Pipe {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Pipe::from_reader(file),
            Err(e) => Pipe::new()
                .with_error(anyhow::Error::new(e).context(format!("open {}", path.display()))),
        }
    }

    /// The process's standard input.
    pub fn stdin() -> Pipe {
        Pipe::from_reader(io::stdin())
    }

    /// Command-line arguments after the program name, one per line.
    pub fn args() -> Pipe {
        Pipe::slice(std::env::args().skip(1))
    }

    /// Every regular file under `dir`, recursively, one path per line, sorted by name
    /// within each directory. Unreadable subdirectories are skipped with a warning.
    pub fn find_files(dir: impl AsRef<Path>) -> Pipe {
        let dir = dir.as_ref();
        if let Err(e) = fs::metadata(dir) {
            return Pipe::new()
                .with_error(anyhow::Error::new(e).context(format!("find {}", dir.display())));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => warn!("Skipping unreadable path: {}", err),
            }
        }
        debug!("find_files {}: {} file(s)", dir.display(), files.len());
        Pipe::slice(path_lines(files))
    }

    /// Files matching `path`: the entries of a directory, the matches of a glob whose
    /// wildcards (`*`, `?`) are in the last component, or the path itself for a file.
    pub fn list_files(path: impl AsRef<Path>) -> Pipe {
        let path = path.as_ref();
        let listed = match path.file_name().and_then(|n| n.to_str()) {
            Some(pattern) if has_glob_chars(pattern) => glob_dir(path, pattern),
            _ => list_path(path),
        };
        match listed {
            Ok(paths) => Pipe::slice(path_lines(paths)),
            Err(err) => Pipe::new().with_error(err),
        }
    }

    /// Empty pipe if `path` exists; otherwise a pipe carrying the lookup error. Use it to
    /// guard a chain: `Pipe::if_exists(p).exec("...")` does nothing when `p` is missing.
    pub fn if_exists(path: impl AsRef<Path>) -> Pipe {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(_) => Pipe::new(),
            Err(e) => Pipe::new()
                .with_error(anyhow::Error::new(e).context(format!("stat {}", path.display()))),
        }
    }
}

fn list_path(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let meta = fs::metadata(path).with_context(|| format!("list {}", path.display()))?;
    if !meta.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut paths = fs::read_dir(path)
        .with_context(|| format!("list {}", path.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("list {}", path.display()))?;
    paths.sort();
    Ok(paths)
}

fn glob_dir(path: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // A missing directory just has no matches.
    let Ok(entries) = fs::read_dir(parent) else {
        return Ok(Vec::new());
    };
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list {}", parent.display()))?;
        let name = entry.file_name();
        if glob_match(pattern, &name.to_string_lossy()) {
            matches.push(match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.join(&name),
                _ => PathBuf::from(&name),
            });
        }
    }
    matches.sort();
    Ok(matches)
}
