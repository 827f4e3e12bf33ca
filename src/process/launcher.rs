//! Process launcher
//!
//! The single choke point for every fork in the shell. It guarantees that
//! each child sees the same process-group discipline, signal dispositions,
//! and fd-setup ordering. A synchronization pipe makes both parent and
//! child set the process group before the child's action runs, so the
//! parent never signals a half-set-up group.

use std::os::unix::io::RawFd;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{setpgid, ForkResult, Pid};

use crate::process::fd;
use crate::process::job::status_code;
use crate::process::signals;
use crate::shell::Shell;

/// How the new process relates to a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// A standalone child: subshell, command substitution, or a simple
    /// command. Becomes its own group leader when job control is active.
    Single,
    /// First stage of a pipeline; its pid becomes the group id.
    PipelineLeader,
    /// Later stage; joins the leader's group.
    PipelineMember,
}

/// Everything the launcher needs to know about the child.
pub struct ProcessConfig {
    pub role: ProcessRole,
    /// Group to join for `PipelineMember`.
    pub pgid_hint: Option<Pid>,
    pub foreground: bool,
    /// The child keeps running shell code after the fork (subshell,
    /// pipeline stage running a compound command, substitution).
    pub is_shell_process: bool,
    /// Pipe end to install as stdin, if any. Closed after installation.
    pub stdin: Option<RawFd>,
    /// Pipe end to install as stdout, if any. Closed after installation.
    pub stdout: Option<RawFd>,
    /// Other pipe ends the child must not hold open.
    pub close_fds: Vec<RawFd>,
}

impl ProcessConfig {
    pub fn single(foreground: bool) -> Self {
        ProcessConfig {
            role: ProcessRole::Single,
            pgid_hint: None,
            foreground,
            is_shell_process: false,
            stdin: None,
            stdout: None,
            close_fds: Vec::new(),
        }
    }
}

/// Fork and run `action` in the child. The action's return value becomes
/// the child's exit status; for external commands the action ends in
/// `execve` and only returns on failure.
///
/// Returns the child pid in the parent.
pub fn launch(
    shell: &mut Shell,
    cfg: &ProcessConfig,
    action: impl FnOnce(&mut Shell) -> i32,
) -> std::io::Result<Pid> {
    let (sync_r, sync_w) = fd::pipe()?;

    // Process groups are set up when job control is active or the job is
    // asynchronous; a non-interactive foreground job stays in the shell's
    // group so terminal reads are not stopped.
    let want_group = shell.opts.monitor || !cfg.foreground;

    let fork_result = unsafe { nix::unistd::fork() }
        .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;

    match fork_result {
        ForkResult::Child => {
            if want_group {
                let pgid = match cfg.role {
                    ProcessRole::Single | ProcessRole::PipelineLeader => Pid::from_raw(0),
                    ProcessRole::PipelineMember => {
                        cfg.pgid_hint.unwrap_or_else(|| Pid::from_raw(0))
                    }
                };
                let _ = setpgid(Pid::from_raw(0), pgid);
            }
            signals::reset_for_child(cfg.is_shell_process);

            // Wait for the parent to finish its half of the group setup.
            fd::close(sync_w);
            let mut byte = [0u8; 1];
            let _ = fd::read_fd(sync_r, &mut byte);
            fd::close(sync_r);

            if let Some(fd_in) = cfg.stdin {
                let _ = fd::dup2(fd_in, 0);
                if fd_in > 2 {
                    fd::close(fd_in);
                }
            }
            if let Some(fd_out) = cfg.stdout {
                let _ = fd::dup2(fd_out, 1);
                if fd_out > 2 {
                    fd::close(fd_out);
                }
            }
            for &extra in &cfg.close_fds {
                fd::close(extra);
            }

            let code = action(shell);
            std::process::exit(code & 0xff);
        }
        ForkResult::Parent { child } => {
            if want_group {
                let pgid = match cfg.role {
                    ProcessRole::Single | ProcessRole::PipelineLeader => child,
                    ProcessRole::PipelineMember => cfg.pgid_hint.unwrap_or(child),
                };
                // Either side may win the race; EACCES after the child
                // execs means it already set its own group.
                let _ = setpgid(child, pgid);
            }
            fd::close(sync_r);
            let _ = fd::write_fd(sync_w, b"x");
            fd::close(sync_w);
            Ok(child)
        }
    }
}

/// Hand the terminal to a foreground job's group.
pub fn give_terminal_to(shell: &Shell, pgid: Pid) {
    if shell.opts.monitor {
        unsafe { libc::tcsetpgrp(0, pgid.as_raw()) };
    }
}

/// Take the terminal back after a foreground job ends.
pub fn reclaim_terminal(shell: &Shell) {
    if shell.opts.monitor {
        unsafe { libc::tcsetpgrp(0, shell.shell_pgid.as_raw()) };
    }
}

/// Blockingly wait for one foreground child; stopped children are moved
/// to the job table. Returns the exit status.
pub fn wait_for_child(shell: &mut Shell, pid: Pid, text: &str) -> i32 {
    let flags = if shell.opts.monitor {
        Some(WaitPidFlag::WUNTRACED)
    } else {
        None
    };
    loop {
        match waitpid(pid, flags) {
            Ok(WaitStatus::Stopped(pid, _)) => {
                let pgid = nix::unistd::getpgid(Some(pid)).unwrap_or(pid);
                let id = shell.jobs.add_stopped(pgid, vec![pid], text.to_string());
                let job = shell.jobs.get(id).expect("job just added");
                eprintln!("[{}]+ Stopped\t{}", job.id, job.text);
                return 128 + libc::SIGTSTP;
            }
            Ok(WaitStatus::StillAlive) | Ok(WaitStatus::Continued(_)) => continue,
            Ok(status) => return status_code(status),
            Err(nix::errno::Errno::EINTR) => continue,
            Err(_) => return 127,
        }
    }
}
