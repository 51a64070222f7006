//! Line filters. All of them go through [`Pipe::filter`], so they run inline in batch
//! mode and on their own thread in streaming mode.

use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, Write};

use crate::Pipe;
use crate::engine::tools::{basename, dirname, scan_lines};

impl Pipe {
    /// Call `process` for every line; whatever it appends to the builder is the output
    /// for that line. Each line's output is handed to the next stage as one piece.
    pub fn each_line<F>(self, mut process: F) -> Pipe
    where
        F: FnMut(&str, &mut String) + Send + 'static,
    {
        self.filter(move |r, w| {
            let mut out = String::new();
            scan_lines(r, |line| {
                out.clear();
                process(line, &mut out);
                if !out.is_empty() {
                    w.write_all(out.as_bytes())?;
                }
                Ok(true)
            })
        })
    }

    /// Replace every line with `f(line)`.
    pub fn filter_line<F>(self, mut f: F) -> Pipe
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        self.each_line(move |line, out| {
            out.push_str(&f(line));
            out.push('\n');
        })
    }

    /// Keep the lines `keep` accepts.
    fn keep_lines<F>(self, mut keep: F) -> Pipe
    where
        F: FnMut(&str) -> bool + Send + 'static,
    {
        self.each_line(move |line, out| {
            if keep(line) {
                out.push_str(line);
                out.push('\n');
            }
        })
    }

    /// Lines containing `s`.
    pub fn match_str(self, s: impl Into<String>) -> Pipe {
        let s = s.into();
        self.keep_lines(move |line| line.contains(s.as_str()))
    }

    /// Lines matching `re`.
    pub fn match_regexp(self, re: Regex) -> Pipe {
        self.keep_lines(move |line| re.is_match(line))
    }

    /// Lines not containing `s`.
    pub fn reject(self, s: impl Into<String>) -> Pipe {
        let s = s.into();
        self.keep_lines(move |line| !line.contains(s.as_str()))
    }

    /// Lines not matching `re`.
    pub fn reject_regexp(self, re: Regex) -> Pipe {
        self.keep_lines(move |line| !re.is_match(line))
    }

    /// Replace every occurrence of `search` with `replacement` in each line.
    pub fn replace(self, search: impl Into<String>, replacement: impl Into<String>) -> Pipe {
        let (search, replacement) = (search.into(), replacement.into());
        self.filter_line(move |line| line.replace(search.as_str(), &replacement))
    }

    /// Replace every match of `re` in each line. `replacement` may refer to groups
    /// (`$1`, `${name}`).
    pub fn replace_regexp(self, re: Regex, replacement: impl Into<String>) -> Pipe {
        let replacement = replacement.into();
        self.filter_line(move |line| re.replace_all(line, replacement.as_str()).into_owned())
    }

    /// The first `n` lines. Stops reading after them.
    pub fn first(self, n: usize) -> Pipe {
        self.filter(move |r, w| {
            if n == 0 {
                return Ok(());
            }
            let mut seen = 0;
            scan_lines(r, |line| {
                writeln!(w, "{line}")?;
                seen += 1;
                Ok(seen < n)
            })
        })
    }

    /// The last `n` lines.
    pub fn last(self, n: usize) -> Pipe {
        self.filter(move |r, w| {
            let mut ring: VecDeque<String> = VecDeque::with_capacity(n.min(1024));
            scan_lines(r, |line| {
                if n > 0 {
                    if ring.len() == n {
                        ring.pop_front();
                    }
                    ring.push_back(line.to_string());
                }
                Ok(true)
            })?;
            for line in ring {
                writeln!(w, "{line}")?;
            }
            Ok(())
        })
    }

    /// Column `col` (1-based, whitespace-separated) of each line. Lines with fewer
    /// columns are dropped.
    pub fn column(self, col: usize) -> Pipe {
        self.each_line(move |line, out| {
            let field = col
                .checked_sub(1)
                .and_then(|i| line.split_whitespace().nth(i));
            if let Some(field) = field {
                out.push_str(field);
                out.push('\n');
            }
        })
    }

    /// Distinct lines prefixed with their count, most frequent first, ties in line order.
    /// Counts are right-aligned to the width of the largest one.
    pub fn freq(self) -> Pipe {
        self.filter(|r, w| {
            let mut counts: HashMap<String, usize> = HashMap::new();
            scan_lines(r, |line| {
                *counts.entry(line.to_string()).or_default() += 1;
                Ok(true)
            })?;
            let mut freqs: Vec<(String, usize)> = counts.into_iter().collect();
            freqs.sort_by(|(a_line, a), (b_line, b)| b.cmp(a).then_with(|| a_line.cmp(b_line)));
            let width = freqs.first().map_or(0, |(_, count)| count.to_string().len());
            for (line, count) in freqs {
                writeln!(w, "{count:>width$} {line}")?;
            }
            Ok(())
        })
    }

    /// All lines joined by single spaces, followed by one newline.
    pub fn join(self) -> Pipe {
        self.filter(|r, w| {
            let mut first = true;
            scan_lines(r, |line| {
                if !first {
                    w.write_all(b" ")?;
                }
                w.write_all(line.as_bytes())?;
                first = false;
                Ok(true)
            })?;
            w.write_all(b"\n")?;
            Ok(())
        })
    }

    /// Treat each line as a file path and output the files' contents in order. Files
    /// that cannot be opened are skipped.
    pub fn concat(self) -> Pipe {
        self.filter(|r, w| {
            scan_lines(r, |path| {
                if let Ok(mut file) = File::open(path) {
                    io::copy(&mut file, &mut *w)?;
                }
                Ok(true)
            })
        })
    }

    /// Last path element of each line.
    pub fn basename(self) -> Pipe {
        self.filter_line(basename)
    }

    /// Directory part of each line.
    pub fn dirname(self) -> Pipe {
        self.filter_line(dirname)
    }
}
