//! Display-level infrastructure: a crate-wide verbosity knob plus the
//! stderr reporting macros used by the coders and the I/O layer.
//!
//! Levels: 0 = silent; 1 = errors only; 2 = normal (progress + summary);
//! 3 = verbose.

use std::sync::atomic::{AtomicU32, Ordering};

/// Crate-wide display level, shared by the CLI and the coder progress hooks.
pub static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(2);

/// Returns the current display level.
#[inline]
pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Sets the display level.
#[inline]
pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Writes to stderr unconditionally.
#[macro_export]
macro_rules! display {
    ($($arg:tt)*) => {
        eprint!($($arg)*)
    };
}

/// Writes to stderr when the current display level is at least `$level`.
#[macro_export]
macro_rules! displaylevel {
    ($level:expr, $($arg:tt)*) => {
        if $crate::display::display_level() >= $level {
            eprint!($($arg)*);
        }
    };
}

/// In-place percentage reporter for long block operations.
///
/// Rewrites a single stderr line at most once per percent step; inert when
/// the display level is below 2 or the total is too small to be worth it.
pub struct Progress {
    last: i64,
    total: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Progress { last: -1, total }
    }

    pub fn update(&mut self, current: u64) {
        if self.total < 100 || display_level() < 2 {
            return;
        }
        let pct = (current / (self.total / 100)) as i64;
        if pct != self.last {
            self.last = pct;
            display!("-> {}%   \r", pct);
        }
    }

    /// Clears the progress line.
    pub fn done(&mut self) {
        if self.last >= 0 {
            display!("         \r");
        }
    }
}
