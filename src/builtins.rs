//! Job-control built-ins — `jobs`, `fg`, `bg`, `kill` — plus the two
//! shell-state built-ins that don't touch job state, `cd` and `quit` (spec
//! §4.7, §6). All job-table access here happens with `SIGCHLD` blocked.

use crate::config::FOREGROUND_SLOT;
use crate::error::ShellError;
use crate::foreground;
use crate::job_control;
use crate::jobs::{JobState, JobTable};
use crate::reaper::BlockedSigchld;

const BUILTINS: &[&str] = &["quit", "cd", "jobs", "fg", "bg", "kill"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// What the main loop should do after a built-in runs.
pub enum Outcome {
    Continue(i32),
    Exit(i32),
}

pub fn execute(program: &str, args: &[String], table: &mut JobTable, tty_fd: libc::c_int) -> Outcome {
    match program {
        "quit" => Outcome::Exit(0),
        "cd" => Outcome::Continue(run_cd(args)),
        "jobs" => Outcome::Continue(run_jobs(table)),
        "fg" => Outcome::Continue(run_fg(args, table, tty_fd)),
        "bg" => Outcome::Continue(run_bg(args, table)),
        "kill" => Outcome::Continue(run_kill(args, table)),
        _ => unreachable!("execute called on non-builtin {program}"),
    }
}

fn run_cd(args: &[String]) -> i32 {
    let target = match args.first() {
        Some(dir) => dir.clone(),
        None => match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("cd: HOME not set");
                return 1;
            }
        },
    };

    match std::env::set_current_dir(&target) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", ShellError::ChdirFailure(target, e));
            1
        }
    }
}

/// Enumerate all occupied slots: index, state, command text (+ exit code
/// for FINISHED); then collects (deletes) every slot just reported FINISHED
/// (spec §4.7: "enumerates... collects finished slots").
fn run_jobs(table: &mut JobTable) -> i32 {
    let _blocked = BlockedSigchld::new();
    let mut finished = Vec::new();
    for slot in table.occupied_slots() {
        let job = table.get(slot).unwrap();
        println!("{}", job.describe(slot));
        if job.state() == JobState::Finished {
            finished.push(slot);
        }
    }
    for slot in finished {
        table.del_job(slot);
    }
    0
}

/// Parse an optional `[n]` argument (no `%` prefix — spec §6's `fg`/`bg`
/// table), falling back to the highest non-FINISHED slot.
fn select_target(args: &[String], table: &JobTable) -> Result<usize, ShellError> {
    match args.first() {
        Some(arg) => {
            let slot: usize = arg
                .parse()
                .map_err(|_| ShellError::UnknownBuiltinTarget(arg.clone()))?;
            if table.is_occupied(slot) && table.get(slot).unwrap().state() != JobState::Finished {
                Ok(slot)
            } else {
                Err(ShellError::UnknownBuiltinTarget(arg.clone()))
            }
        }
        None => table
            .default_target()
            .ok_or_else(|| ShellError::UnknownBuiltinTarget("current".to_string())),
    }
}

fn run_fg(args: &[String], table: &mut JobTable, tty_fd: libc::c_int) -> i32 {
    let _blocked = BlockedSigchld::new();
    let slot = match select_target(args, table) {
        Ok(slot) => slot,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let pgid = table.get(slot).unwrap().pgid;
    if let Err(e) = job_control::send_to_group(pgid, libc::SIGCONT) {
        eprintln!("jsh: fg: failed to continue pgid {pgid}: {e}");
        return 1;
    }
    if slot != FOREGROUND_SLOT {
        table.move_job(slot, FOREGROUND_SLOT);
    }

    match foreground::run(table, tty_fd) {
        foreground::Outcome::Finished(code) => code,
        foreground::Outcome::Stopped(new_slot) => {
            println!("{}", table.get(new_slot).unwrap().describe(new_slot));
            -1
        }
    }
}

fn run_bg(args: &[String], table: &mut JobTable) -> i32 {
    let _blocked = BlockedSigchld::new();
    let slot = match select_target(args, table) {
        Ok(slot) => slot,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let pgid = table.get(slot).unwrap().pgid;
    if let Err(e) = job_control::send_to_group(pgid, libc::SIGCONT) {
        eprintln!("jsh: bg: failed to continue pgid {pgid}: {e}");
        return 1;
    }
    println!("[{slot}] running '{}'", table.get(slot).unwrap().command_text);
    0
}

fn run_kill(args: &[String], table: &mut JobTable) -> i32 {
    let _blocked = BlockedSigchld::new();
    let Some(arg) = args.first() else {
        eprintln!("{}", ShellError::UsageError("kill: usage: kill %n".to_string()));
        return -1;
    };
    let Some(n) = arg.strip_prefix('%') else {
        eprintln!("{}", ShellError::UsageError("kill: usage: kill %n".to_string()));
        return -1;
    };
    let Ok(slot) = n.parse::<usize>() else {
        eprintln!("{}", ShellError::UsageError(format!("kill: {arg}: not a job number")));
        return -1;
    };
    if !table.is_occupied(slot) || table.get(slot).unwrap().state() == JobState::Finished {
        eprintln!("{}", ShellError::UnknownBuiltinTarget(slot.to_string()));
        return 1;
    }

    let pgid = table.get(slot).unwrap().pgid;
    match job_control::send_to_group(pgid, libc::SIGTERM) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("jsh: kill: failed to signal pgid {pgid}: {e}");
            1
        }
    }
}
