//! Job table (spec §3, §4.3): an arena with stable, user-visible slot
//! indices. Slot 0 is reserved for the foreground job; background jobs live
//! at indices ≥ 1. The table grows on demand and never shrinks — indices are
//! stable identities for the shell's lifetime (spec §9: "Job table as arena
//! + stable indices... Do not model with back-pointers or shared
//! ownership").

use crate::config::{FOREGROUND_SLOT, JOB_TABLE_GROWTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Stopped,
    Finished(i32),
}

/// A single launched child (spec §3 "Process record").
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: libc::pid_t,
    pub state: ProcState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Finished,
}

/// Which reserved region a new job should occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClass {
    Foreground,
    Background,
}

/// A set of processes sharing one process group (spec §3 "Job").
#[derive(Debug, Clone)]
pub struct Job {
    pub pgid: libc::pid_t,
    pub processes: Vec<Process>,
    pub command_text: String,
}

impl Job {
    /// Derive aggregate state from member states (spec §3 invariant 3): any
    /// RUNNING ⇒ RUNNING; else any STOPPED ⇒ STOPPED; else FINISHED.
    pub fn state(&self) -> JobState {
        if self.processes.iter().any(|p| p.state == ProcState::Running) {
            JobState::Running
        } else if self.processes.iter().any(|p| p.state == ProcState::Stopped) {
            JobState::Stopped
        } else {
            JobState::Finished
        }
    }

    /// Exit code of the pipeline: the last stage's code (spec §3 invariant
    /// 6), meaningful only once the job is FINISHED.
    pub fn exit_code(&self) -> Option<i32> {
        match self.processes.last()?.state {
            ProcState::Finished(code) => Some(code),
            _ => None,
        }
    }

    /// The `[n] state (cmd)` display line spec §4.7/§8 use for `jobs` and
    /// for state-transition announcements, with `= code` appended once
    /// FINISHED.
    pub fn describe(&self, slot: usize) -> String {
        match self.state() {
            JobState::Running => format!("[{slot}] running ({})", self.command_text),
            JobState::Stopped => format!("[{slot}] stopped ({})", self.command_text),
            JobState::Finished => {
                let code = self.exit_code().unwrap_or(-1);
                format!("[{slot}] finished ({}) = {code}", self.command_text)
            }
        }
    }
}

pub struct JobTable {
    slots: Vec<Option<Job>>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(JOB_TABLE_GROWTH);
        slots.resize_with(JOB_TABLE_GROWTH, || None);
        JobTable { slots }
    }

    /// Allocate a job slot (spec §4.3 `add_job`). Foreground always lands at
    /// slot 0 (must be empty); background takes the lowest free index ≥ 1,
    /// growing the table if none is free.
    pub fn add_job(&mut self, pgid: libc::pid_t, class: SlotClass) -> usize {
        match class {
            SlotClass::Foreground => {
                assert!(
                    self.slots[FOREGROUND_SLOT].is_none(),
                    "foreground slot must be empty"
                );
                self.slots[FOREGROUND_SLOT] = Some(Job {
                    pgid,
                    processes: Vec::new(),
                    command_text: String::new(),
                });
                FOREGROUND_SLOT
            }
            SlotClass::Background => {
                let idx = self.reserve_background_slot();
                self.slots[idx] = Some(Job {
                    pgid,
                    processes: Vec::new(),
                    command_text: String::new(),
                });
                idx
            }
        }
    }

    /// Find (growing the table if necessary) the lowest free background
    /// index, without occupying it. Used by the foreground monitor, which
    /// then relocates an existing job into the reserved slot via
    /// `move_job` rather than populating a fresh one.
    pub fn reserve_background_slot(&mut self) -> usize {
        loop {
            if let Some(idx) = self.first_free_background() {
                return idx;
            }
            let grow_from = self.slots.len();
            self.slots.resize_with(grow_from + JOB_TABLE_GROWTH, || None);
        }
    }

    fn first_free_background(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(FOREGROUND_SLOT + 1)
            .find(|(_, s)| s.is_none())
            .map(|(i, _)| i)
    }

    /// Append a process to a job, and its argv to the job's display text,
    /// joining stages with `" | "` (spec §4.3 `add_proc`).
    pub fn add_proc(&mut self, slot: usize, pid: libc::pid_t, argv: &[String]) {
        let job = self.slots[slot].as_mut().expect("add_proc on empty slot");
        job.processes.push(Process {
            pid,
            state: ProcState::Running,
        });
        if !job.command_text.is_empty() {
            job.command_text.push_str(" | ");
        }
        job.command_text.push_str(&argv.join(" "));
    }

    /// Destroy a FINISHED job and zero the slot (spec §4.3 `del_job`).
    pub fn del_job(&mut self, slot: usize) -> Job {
        let job = self.slots[slot].take().expect("del_job on empty slot");
        assert_eq!(job.state(), JobState::Finished, "del_job precondition");
        job
    }

    /// Relocate a job's entire record from `from` to `to`, zeroing `from`
    /// (spec §4.3 `move_job`). `to` must be empty.
    pub fn move_job(&mut self, from: usize, to: usize) {
        assert!(self.slots[to].is_none(), "move_job target must be empty");
        self.slots[to] = self.slots[from].take();
    }

    pub fn get(&self, slot: usize) -> Option<&Job> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Job> {
        self.slots.get_mut(slot).and_then(|s| s.as_mut())
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.is_some())
    }

    /// All occupied background slots, ascending.
    pub fn background_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(FOREGROUND_SLOT + 1)
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    /// All occupied slots, ascending (for `jobs`).
    pub fn occupied_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    /// Highest-index background slot whose state is not FINISHED — the
    /// default target for `fg`/`bg` with no argument (spec §4.7).
    pub fn default_target(&self) -> Option<usize> {
        self.background_slots()
            .into_iter()
            .rev()
            .find(|&slot| self.slots[slot].as_ref().unwrap().state() != JobState::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(state: ProcState) -> Process {
        Process { pid: 1, state }
    }

    #[test]
    fn foreground_slot_is_zero() {
        let mut t = JobTable::new();
        let slot = t.add_job(100, SlotClass::Foreground);
        assert_eq!(slot, FOREGROUND_SLOT);
    }

    #[test]
    fn background_jobs_take_lowest_free_index() {
        let mut t = JobTable::new();
        let a = t.add_job(10, SlotClass::Background);
        let b = t.add_job(20, SlotClass::Background);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn table_grows_when_full() {
        let mut t = JobTable::new();
        let mut last = 0;
        for _ in 0..(JOB_TABLE_GROWTH + 2) {
            last = t.add_job(10, SlotClass::Background);
        }
        assert!(last >= JOB_TABLE_GROWTH);
    }

    #[test]
    fn aggregate_state_rule() {
        let mut job = Job {
            pgid: 1,
            processes: vec![proc(ProcState::Finished(0)), proc(ProcState::Running)],
            command_text: String::new(),
        };
        assert_eq!(job.state(), JobState::Running);
        job.processes[1].state = ProcState::Stopped;
        assert_eq!(job.state(), JobState::Stopped);
        job.processes[1].state = ProcState::Finished(3);
        assert_eq!(job.state(), JobState::Finished);
    }

    #[test]
    fn exit_code_is_last_stage() {
        let job = Job {
            pgid: 1,
            processes: vec![proc(ProcState::Finished(1)), proc(ProcState::Finished(0))],
            command_text: String::new(),
        };
        assert_eq!(job.exit_code(), Some(0));
    }

    #[test]
    fn move_job_relocates_and_zeroes_source() {
        let mut t = JobTable::new();
        let fg = t.add_job(50, SlotClass::Foreground);
        t.add_proc(fg, 50, &["sleep".into(), "100".into()]);
        let bg = t.add_job(1, SlotClass::Background);
        t.move_job(fg, bg + 1);
        assert!(!t.is_occupied(fg));
    }

    #[test]
    fn default_target_skips_finished() {
        let mut t = JobTable::new();
        let a = t.add_job(10, SlotClass::Background);
        t.add_proc(a, 10, &["a".into()]);
        t.get_mut(a).unwrap().processes[0].state = ProcState::Finished(0);
        let b = t.add_job(20, SlotClass::Background);
        t.add_proc(b, 20, &["b".into()]);
        assert_eq!(t.default_target(), Some(b));
    }
}
