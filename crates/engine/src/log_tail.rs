// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Last `n` lines of the file at `path`, or `None` if it cannot be opened.
///
/// Invalid UTF-8 is replaced rather than failing the read.
pub fn tail_lines(path: &Path, n: usize) -> Option<Vec<String>> {
    let file = std::fs::File::open(path).ok()?;
    if n == 0 {
        return Some(Vec::new());
    }
    let mut lines = VecDeque::with_capacity(n.min(4096));
    for line in BufReader::new(file).split(b'\n').map_while(Result::ok) {
        if lines.len() == n {
            lines.pop_front();
        }
        let line = String::from_utf8_lossy(&line);
        lines.push_back(line.trim_end_matches('\r').to_string());
    }
    Some(lines.into())
}

#[cfg(test)]
#[path = "log_tail_tests.rs"]
mod tests;
