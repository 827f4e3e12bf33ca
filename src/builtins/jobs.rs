//! Job-control built-ins: jobs, fg, bg, wait

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use crate::exec::ExecError;
use crate::process::job::{JobState, ProcStatus};
use crate::process::launcher;
use crate::shell::Shell;

pub fn jobs_cmd(shell: &mut Shell, _args: &[String]) -> Result<i32, ExecError> {
    shell.jobs.reap();
    let current = shell.jobs.current().map(|j| j.id);
    for job in shell.jobs.jobs() {
        let mark = if Some(job.id) == current { '+' } else { '-' };
        let state = match job.state() {
            JobState::Running => "Running".to_string(),
            JobState::Stopped => "Stopped".to_string(),
            JobState::Done => {
                let code = job.exit_status();
                if code == 0 {
                    "Done".to_string()
                } else {
                    format!("Exit {code}")
                }
            }
        };
        println!("[{}]{} {}\t{}", job.id, mark, state, job.text);
    }
    Ok(0)
}

fn resolve_job(shell: &mut Shell, args: &[String]) -> Option<usize> {
    shell.jobs.reap();
    let job = match args.first() {
        None => shell.jobs.current(),
        Some(spec) => shell.jobs.resolve(spec),
    };
    job.map(|j| j.id)
}

pub fn fg_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let id = match resolve_job(shell, args) {
        Some(id) => id,
        None => {
            eprintln!("marsh: fg: no such job");
            return Ok(1);
        }
    };
    let (pgid, text) = {
        let job = shell.jobs.get(id).expect("job resolved above");
        (job.pgid, job.text.clone())
    };
    eprintln!("{text}");
    launcher::give_terminal_to(shell, pgid);
    if killpg(pgid, Signal::SIGCONT).is_err() {
        launcher::reclaim_terminal(shell);
        eprintln!("marsh: fg: job has terminated");
        shell.jobs.remove(id);
        return Ok(1);
    }
    mark_running(shell, id);
    let status = shell.jobs.wait_job(id);
    launcher::reclaim_terminal(shell);
    Ok(status)
}

pub fn bg_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let id = match resolve_job(shell, args) {
        Some(id) => id,
        None => {
            eprintln!("marsh: bg: no such job");
            return Ok(1);
        }
    };
    let pgid = shell.jobs.get(id).expect("job resolved above").pgid;
    if killpg(pgid, Signal::SIGCONT).is_err() {
        eprintln!("marsh: bg: job has terminated");
        shell.jobs.remove(id);
        return Ok(1);
    }
    mark_running(shell, id);
    if let Some(job) = shell.jobs.get(id) {
        eprintln!("[{}]+ {} &", job.id, job.text);
    }
    Ok(0)
}

fn mark_running(shell: &mut Shell, id: usize) {
    // A continued job's stopped processes are running again.
    let pids: Vec<Pid> = shell
        .jobs
        .get(id)
        .map(|j| {
            j.processes
                .iter()
                .filter(|p| p.status == ProcStatus::Stopped)
                .map(|p| p.pid)
                .collect()
        })
        .unwrap_or_default();
    for pid in pids {
        shell
            .jobs
            .record(pid, nix::sys::wait::WaitStatus::Continued(pid));
    }
}

pub fn wait_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    shell.jobs.reap();
    if args.is_empty() {
        // Wait for every known job.
        let ids: Vec<usize> = shell.jobs.jobs().iter().map(|j| j.id).collect();
        let mut status = 0;
        for id in ids {
            status = shell.jobs.wait_job(id);
        }
        return Ok(status);
    }

    let mut status = 0;
    for spec in args {
        if spec.starts_with('%') {
            match shell.jobs.resolve(spec).map(|j| j.id) {
                Some(id) => status = shell.jobs.wait_job(id),
                None => {
                    eprintln!("marsh: wait: {spec}: no such job");
                    status = 127;
                }
            }
            continue;
        }
        // A bare pid.
        match spec.parse::<i32>() {
            Ok(pid) => {
                let pid = Pid::from_raw(pid);
                let id = shell
                    .jobs
                    .jobs()
                    .iter()
                    .find(|j| j.processes.iter().any(|p| p.pid == pid))
                    .map(|j| j.id);
                match id {
                    Some(id) => status = shell.jobs.wait_job(id),
                    None => {
                        // Not one of ours (or already reaped).
                        status = 127;
                    }
                }
            }
            Err(_) => {
                eprintln!("marsh: wait: {spec}: not a pid or valid job spec");
                status = 2;
            }
        }
    }
    Ok(status)
}
