//! Small runtime-tunable constants, kept out of the modules that use them.

/// Displayed at the start of every line.
pub const PROMPT: &str = "# ";

/// Growth increment when the job table has no free background slot.
pub const JOB_TABLE_GROWTH: usize = 8;

/// Slot 0 is reserved for the foreground job; see jobs::JobTable.
pub const FOREGROUND_SLOT: usize = 0;
