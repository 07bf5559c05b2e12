// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration formatting for status output.

/// Clock-style `H:MM:SS`; hours are not wrapped into days.
pub fn format_hms(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
