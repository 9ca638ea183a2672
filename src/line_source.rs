//! The "read_line source" external collaborator: spec.md scopes the real
//! line editor and history out of the core engine, specifying it only by the
//! interface it presents — one command line at a time, or end-of-input.

use std::io;

pub trait LineSource {
    /// Returns `Ok(None)` at end-of-input, `Ok(Some(line))` otherwise. The
    /// returned line has no trailing newline. A `SIGINT` landing mid-read
    /// surfaces as `Err(ErrorKind::Interrupted)` rather than being retried
    /// internally, so the caller's read loop sees it and can discard the
    /// in-progress line (spec §4.8's "long-jump checkpoint").
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// The simplest possible line source: raw stdin, no editing, no history.
/// Reads one byte at a time via `libc::read` rather than `std::io::Read`,
/// because `std`'s own read wrappers retry `EINTR` internally (`cvt_r`) and
/// would swallow the interruption this engine needs to observe.
pub struct StdinLineSource {
    fd: libc::c_int,
}

impl StdinLineSource {
    pub fn new() -> Self {
        StdinLineSource {
            fd: libc::STDIN_FILENO,
        }
    }
}

impl Default for StdinLineSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for StdinLineSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let mut byte: u8 = 0;
        loop {
            let n = unsafe {
                libc::read(self.fd, &mut byte as *mut u8 as *mut libc::c_void, 1)
            };
            if n == 0 {
                return Ok(if buf.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&buf).into_owned())
                });
            }
            if n < 0 {
                // EINTR here means SIGINT (SIGCHLD keeps SA_RESTART, see
                // reaper::install_handlers) — surface it untouched.
                return Err(io::Error::last_os_error());
            }
            match byte {
                b'\n' => return Ok(Some(String::from_utf8_lossy(&buf).into_owned())),
                b'\r' => {}
                other => buf.push(other),
            }
        }
    }
}
