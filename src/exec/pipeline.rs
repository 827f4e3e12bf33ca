//! Pipeline execution
//!
//! For an N-stage pipeline: N-1 pipes, N children. The first child
//! becomes the pipeline leader (its pid is the process-group id) and the
//! rest join that group. The parent closes every pipe end, hands the
//! terminal to the group for foreground jobs, and waits on each child.
//! The exit status is the last stage's, unless `pipefail` selects the
//! rightmost non-zero status.

use std::os::unix::io::RawFd;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::ast::types::PipelineNode;
use crate::exec::{exec_command, flow_exit_status, ExecError};
use crate::process::fd;
use crate::process::job::status_code;
use crate::process::launcher::{self, ProcessConfig, ProcessRole};
use crate::shell::Shell;

pub fn exec_pipeline(shell: &mut Shell, pl: &PipelineNode) -> Result<i32, ExecError> {
    let n = pl.commands.len();
    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        pipes.push(fd::pipe().map_err(|e| ExecError::Redirect(e.to_string()))?);
    }

    let mut pids: Vec<Pid> = Vec::with_capacity(n);
    let mut pgid: Option<Pid> = None;

    for (i, cmd) in pl.commands.iter().enumerate() {
        let stdin = if i > 0 { Some(pipes[i - 1].0) } else { None };
        let stdout = if i < n - 1 { Some(pipes[i].1) } else { None };
        // Every other pipe end must be closed in this child.
        let close_fds: Vec<RawFd> = pipes
            .iter()
            .flat_map(|&(r, w)| [r, w])
            .filter(|f| Some(*f) != stdin && Some(*f) != stdout)
            .collect();

        let cfg = ProcessConfig {
            role: if i == 0 {
                ProcessRole::PipelineLeader
            } else {
                ProcessRole::PipelineMember
            },
            pgid_hint: pgid,
            foreground: true,
            is_shell_process: true,
            stdin,
            stdout,
            close_fds,
        };
        let stage = cmd.clone();
        let pid = launcher::launch(shell, &cfg, move |sh| {
            sh.enter_subshell();
            match exec_command(sh, &stage) {
                Ok(status) => status,
                Err(flow) => flow_exit_status(sh, flow),
            }
        })
        .map_err(|e| {
            // A failed fork mid-pipeline: close the pipes so the children
            // already started see EOF and can finish.
            for &(r, w) in &pipes {
                fd::close(r);
                fd::close(w);
            }
            ExecError::Redirect(e.to_string())
        })?;

        if pgid.is_none() {
            pgid = Some(pid);
        }
        pids.push(pid);
    }

    for &(r, w) in &pipes {
        fd::close(r);
        fd::close(w);
    }

    let pgid = pgid.expect("pipeline has at least one stage");
    launcher::give_terminal_to(shell, pgid);

    let mut statuses = vec![0i32; pids.len()];
    let mut stopped = false;
    let flags = if shell.opts.monitor {
        Some(WaitPidFlag::WUNTRACED)
    } else {
        None
    };
    for (i, &pid) in pids.iter().enumerate() {
        loop {
            match waitpid(pid, flags) {
                Ok(WaitStatus::Stopped(..)) => {
                    stopped = true;
                    statuses[i] = 128 + libc::SIGTSTP;
                    break;
                }
                Ok(WaitStatus::StillAlive) | Ok(WaitStatus::Continued(_)) => continue,
                Ok(status) => {
                    statuses[i] = status_code(status);
                    break;
                }
                Err(nix::errno::Errno::EINTR) => continue,
                Err(_) => {
                    statuses[i] = 127;
                    break;
                }
            }
        }
    }
    launcher::reclaim_terminal(shell);

    if stopped {
        let id = shell
            .jobs
            .add_stopped(pgid, pids.clone(), "pipeline".to_string());
        if let Some(job) = shell.jobs.get(id) {
            eprintln!("[{}]+ Stopped\t{}", job.id, job.text);
        }
        return Ok(128 + libc::SIGTSTP);
    }

    let status = if shell.opts.pipefail {
        statuses
            .iter()
            .rev()
            .find(|&&s| s != 0)
            .copied()
            .unwrap_or(0)
    } else {
        *statuses.last().unwrap_or(&0)
    };
    Ok(status)
}
