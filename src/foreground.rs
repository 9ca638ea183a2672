//! Foreground monitor (spec §4.5): hands the terminal to the foreground
//! job's process group, waits for it to stop or finish, and reclaims the
//! terminal for the shell either way.

use log::debug;

use crate::config::FOREGROUND_SLOT;
use crate::job_control::ForegroundTerminalGuard;
use crate::jobs::{JobState, JobTable};
use crate::reaper::{reap_all, suspend_until_signal, BlockedSigchld};

/// Outcome of running a foreground job to a stopping point.
pub enum Outcome {
    /// Finished; carries the pipeline's exit code (last stage, spec
    /// invariant 6).
    Finished(i32),
    /// Stopped (e.g. Ctrl-Z) and demoted to the returned background slot.
    Stopped(usize),
}

/// Precondition: slot 0 is occupied. Runs the loop described in spec §4.5:
/// the aggregate state is only trusted right after `reap_all`, and is
/// re-checked immediately after every wakeup from `suspend_until_signal` —
/// never right before suspending — so a `SIGCHLD` that lands between the
/// last check and the call to suspend is never missed (spec §4.5's closing
/// paragraph).
pub fn run(table: &mut JobTable, tty_fd: libc::c_int) -> Outcome {
    let pgid = table
        .get(FOREGROUND_SLOT)
        .expect("foreground monitor requires an occupied slot 0")
        .pgid;

    let terminal_guard = if crate::job_control::isatty(tty_fd) {
        match ForegroundTerminalGuard::new(tty_fd, pgid) {
            Ok(guard) => Some(guard),
            Err(e) => {
                log::warn!("failed to move terminal to pgid {pgid}: {e}");
                None
            }
        }
    } else {
        None
    };

    // Block SIGCHLD for the whole monitor loop; `suspend_until_signal`
    // unblocks it only for the instant the kernel delivers a signal.
    let _blocked = BlockedSigchld::new();

    let outcome = loop {
        reap_all(table);
        match table.get(FOREGROUND_SLOT).unwrap().state() {
            JobState::Running => {
                suspend_until_signal();
                continue;
            }
            JobState::Stopped => {
                let slot = table.reserve_background_slot();
                table.move_job(FOREGROUND_SLOT, slot);
                debug!("foreground job stopped, demoted to slot {slot}");
                break Outcome::Stopped(slot);
            }
            JobState::Finished => {
                let code = table
                    .get(FOREGROUND_SLOT)
                    .unwrap()
                    .exit_code()
                    .unwrap_or(-1);
                table.del_job(FOREGROUND_SLOT);
                break Outcome::Finished(code);
            }
        }
    };

    drop(terminal_guard);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobTable, ProcState, SlotClass};

    #[test]
    fn finished_job_is_deleted_and_reports_last_stage_code() {
        let mut table = JobTable::new();
        let slot = table.add_job(999, SlotClass::Foreground);
        table.add_proc(slot, 1, &["false".into()]);
        table.add_proc(slot, 2, &["true".into()]);
        table.get_mut(slot).unwrap().processes[0].state = ProcState::Finished(1);
        table.get_mut(slot).unwrap().processes[1].state = ProcState::Finished(0);

        // No real child to wait on, so exercise the post-reap branch
        // directly rather than going through suspend_until_signal.
        match table.get(FOREGROUND_SLOT).unwrap().state() {
            JobState::Finished => {
                let code = table.get(FOREGROUND_SLOT).unwrap().exit_code().unwrap();
                assert_eq!(code, 0);
                table.del_job(FOREGROUND_SLOT);
            }
            _ => panic!("expected finished state"),
        }
        assert!(!table.is_occupied(FOREGROUND_SLOT));
    }
}
