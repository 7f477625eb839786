// This file is part of Nitrogen.
//
// Nitrogen is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Nitrogen is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Nitrogen.  If not, see <http://www.gnu.org/licenses/>.

// Progress for the person running the tool. Diagnostics go through `log`.
use std::{
    io::{self, Write},
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

static INDENT: AtomicUsize = AtomicUsize::new(0);

fn indentation() -> String {
    "  ".repeat(INDENT.load(Ordering::Relaxed))
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 1. {
        format!("{}ms", elapsed.as_millis())
    } else if secs < 60. {
        format!("{:.1}s", secs)
    } else {
        format!("{}m{:02}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60)
    }
}

/// A headline with everything printed while it lives indented below it.
pub struct Stage {
    start: Instant,
}

impl Stage {
    pub fn begin(headline: &str) -> Self {
        eprintln!("{}{}...", indentation(), headline);
        INDENT.fetch_add(1, Ordering::Relaxed);
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        INDENT.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Print one line under the current stage.
pub fn note(message: &str) {
    eprintln!("{}{}", indentation(), message);
}

/// An "N of M <what> done" counter rewritten in place. Dropping it before
/// `finish` leaves the partial line behind and moves to a fresh one, so
/// that an error message does not land in the middle of it.
pub struct Counter {
    what: &'static str,
    total: usize,
    shown: usize,
    finished: bool,
}

impl Counter {
    pub fn new(what: &'static str, total: usize) -> Self {
        eprint!("{}", indentation());
        Self {
            what,
            total,
            shown: 0,
            finished: false,
        }
    }

    pub fn update(&mut self, done: usize) {
        let text = counter_text(done, self.total, self.what);
        let mut stderr = io::stderr();
        write!(stderr, "{}{}", "\u{8}".repeat(self.shown), text).ok();
        stderr.flush().ok();
        self.shown = text.chars().count();
    }

    pub fn finish(mut self) {
        self.finished = true;
        eprintln!();
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        if !self.finished {
            eprintln!();
        }
    }
}

fn counter_text(done: usize, total: usize, what: &str) -> String {
    format!("{} of {} {} done", done, total, what)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counter_text() {
        assert_eq!(counter_text(3, 16, "layers"), "3 of 16 layers done");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
    }
}
