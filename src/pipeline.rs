//! Pipeline driver (spec §4.6): builds the stage graph with pipes, submits
//! each stage, and registers them under one job. A single command with no
//! `|` is just the one-stage case — the "fast path" spec §8 calls out is
//! this same function with `stages.len() == 1`.

use std::process::Stdio;

use os_pipe::pipe;

use crate::error::ShellError;
use crate::jobs::{JobTable, SlotClass};
use crate::launcher::{launch, LaunchSpec};
use crate::redirect::{self, Redirection};

/// One pipeline stage: its argv and whatever `<`/`>` redirects the
/// redirection resolver pulled out of its tokens.
pub struct Stage {
    pub argv: Vec<String>,
    pub redirection: Redirection,
}

/// Launch every stage, threading pipes between them:
///
/// ```text
/// input ← inherit
/// for i in 0..N:
///     if i < N-1: (next_input, output) ← pipe()
///     else:       output ← inherit (or this stage's own redirect)
///     pid ← launch(stage_i, pgid, input, output)
///     if i == 0: pgid ← pid; job ← add_job(pgid, class)
///     add_proc(job, pid, stage_i.argv)
///     input ← next_input
/// ```
///
/// After each iteration the parent holds no pipe fd from the stage just
/// launched: `Stdio::from(owned_fd)` moves that descriptor into the
/// `Command`, which dup's it into the child and drops its own copy once
/// `spawn` returns — the same close discipline spec §4.6 describes, done by
/// `std`'s ownership rules instead of by hand.
///
/// Every stage's redirection targets are opened before any stage is
/// launched (spec §4.1: "the open happens in the parent"). This matters
/// beyond ordering: once a stage beyond the first has launched, its job
/// already occupies a slot, and a later stage's `RedirectOpenFailure` would
/// otherwise return an `Err` with that slot still occupied — never reaped,
/// since only background slots are swept between prompts. Opening
/// everything first means a bad redirect anywhere in the pipeline is
/// reported before a single process exists.
pub fn spawn_stages(
    stages: &[Stage],
    class: SlotClass,
    table: &mut JobTable,
) -> Result<usize, ShellError> {
    let opened_redirections = stages
        .iter()
        .map(|stage| redirect::open(&stage.redirection))
        .collect::<Result<Vec<_>, _>>()?;

    let mut input_stdio = Stdio::inherit();
    let mut pgid: Option<libc::pid_t> = None;
    let mut job_slot: Option<usize> = None;

    for (i, (stage, opened)) in stages.iter().zip(opened_redirections).enumerate() {
        let is_last = i + 1 == stages.len();

        let stdin_stdio = match opened.input {
            Some(file) => Stdio::from(file),
            None => input_stdio,
        };

        let (stdout_stdio, next_input) = match opened.output {
            Some(file) => (Stdio::from(file), None),
            None if !is_last => {
                let (reader, writer) = pipe().map_err(ShellError::PipeFailure)?;
                (Stdio::from(writer), Some(Stdio::from(reader)))
            }
            None => (Stdio::inherit(), None),
        };

        let spec = LaunchSpec {
            argv: &stage.argv,
            pgid,
            stdin: stdin_stdio,
            stdout: stdout_stdio,
        };

        let (child, resolved_pgid) = launch(spec).map_err(ShellError::ForkFailure)?;
        let pid = child.id() as libc::pid_t;
        // Not waited here: the global reaper (spec §4.4) owns every wait()
        // call via waitpid(-1, ...), so the child handle is dropped once we
        // have its pid. std never kills on Drop; this just lets it become a
        // tracked zombie until the reaper collects it.
        drop(child);

        if i == 0 {
            pgid = Some(resolved_pgid);
            job_slot = Some(table.add_job(resolved_pgid, class));
        }
        table.add_proc(job_slot.expect("first stage always sets job_slot"), pid, &stage.argv);

        input_stdio = next_input.unwrap_or(Stdio::inherit());
    }

    Ok(job_slot.expect("spawn_stages requires at least one stage"))
}
