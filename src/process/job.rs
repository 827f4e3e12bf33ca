//! Job table
//!
//! Tracks background and stopped jobs. The table is owned by the shell
//! process; subshells receive a copy that is immediately cleared, so a
//! subshell never updates the parent's table. Completed children are
//! reaped non-blockingly at executor boundaries and reported once per
//! state transition.

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// State of one process in a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatus {
    Running,
    Stopped,
    Exited(i32),
}

#[derive(Debug, Clone)]
pub struct JobProcess {
    pub pid: Pid,
    pub status: ProcStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pgid: Pid,
    pub processes: Vec<JobProcess>,
    pub text: String,
    /// Reported to the user since the last state change.
    pub notified: bool,
}

impl Job {
    pub fn state(&self) -> JobState {
        if self
            .processes
            .iter()
            .all(|p| matches!(p.status, ProcStatus::Exited(_)))
        {
            JobState::Done
        } else if self
            .processes
            .iter()
            .any(|p| p.status == ProcStatus::Stopped)
        {
            JobState::Stopped
        } else {
            JobState::Running
        }
    }

    /// A job's exit status is its last process's.
    pub fn exit_status(&self) -> i32 {
        match self.processes.last().map(|p| p.status) {
            Some(ProcStatus::Exited(code)) => code,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

/// Exit status encoding for a reaped wait status.
pub fn status_code(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
        WaitStatus::Stopped(_, sig) => 128 + sig as i32,
        _ => 0,
    }
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.next_id = 1;
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn add(&mut self, pgid: Pid, pids: Vec<Pid>, text: String) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.push(Job {
            id,
            pgid,
            processes: pids
                .into_iter()
                .map(|pid| JobProcess {
                    pid,
                    status: ProcStatus::Running,
                })
                .collect(),
            text,
            notified: false,
        });
        id
    }

    /// Register a foreground job that was stopped by a signal.
    pub fn add_stopped(&mut self, pgid: Pid, pids: Vec<Pid>, text: String) -> usize {
        let id = self.add(pgid, pids, text);
        if let Some(job) = self.jobs.last_mut() {
            for p in &mut job.processes {
                p.status = ProcStatus::Stopped;
            }
        }
        id
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Most recently added job, the `%%`/`%+` default.
    pub fn current(&self) -> Option<&Job> {
        self.jobs.last()
    }

    /// Resolve a job spec: `%1`, `%%`, `%+`, `%-`, or a bare number.
    pub fn resolve(&self, spec: &str) -> Option<&Job> {
        let spec = spec.strip_prefix('%').unwrap_or(spec);
        match spec {
            "" | "%" | "+" => self.current(),
            "-" => self.jobs.iter().rev().nth(1),
            n => n.parse::<usize>().ok().and_then(|id| self.get(id)),
        }
    }

    /// Non-blocking reap of every child; updates job states.
    pub fn reap(&mut self) {
        loop {
            let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
            match waitpid(Pid::from_raw(-1), Some(flags)) {
                Ok(WaitStatus::StillAlive) | Err(_) => break,
                Ok(status) => {
                    let pid = match status.pid() {
                        Some(pid) => pid,
                        None => break,
                    };
                    self.record(pid, status);
                }
            }
        }
    }

    /// Record a wait status observed for `pid` (from `reap` or from a
    /// blocking wait that picked up another child's status).
    pub fn record(&mut self, pid: Pid, status: WaitStatus) {
        for job in &mut self.jobs {
            if let Some(proc) = job.processes.iter_mut().find(|p| p.pid == pid) {
                proc.status = match status {
                    WaitStatus::Stopped(..) => ProcStatus::Stopped,
                    WaitStatus::Continued(_) => ProcStatus::Running,
                    s => ProcStatus::Exited(status_code(s)),
                };
                job.notified = false;
                return;
            }
        }
    }

    /// Blockingly wait until the given job finishes or stops; returns its
    /// exit status.
    pub fn wait_job(&mut self, id: usize) -> i32 {
        loop {
            let pending: Vec<Pid> = match self.get(id) {
                None => return 0,
                Some(job) => match job.state() {
                    JobState::Done => {
                        let code = job.exit_status();
                        self.remove(id);
                        return code;
                    }
                    JobState::Stopped => return 128 + libc::SIGTSTP,
                    JobState::Running => job
                        .processes
                        .iter()
                        .filter(|p| p.status == ProcStatus::Running)
                        .map(|p| p.pid)
                        .collect(),
                },
            };
            for pid in pending {
                match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                    Ok(status) => {
                        if let Some(pid) = status.pid() {
                            self.record(pid, status);
                        }
                    }
                    Err(_) => {
                        // Child already gone; treat as exited.
                        self.record(pid, WaitStatus::Exited(pid, 0));
                    }
                }
            }
        }
    }

    pub fn remove(&mut self, id: usize) {
        self.jobs.retain(|j| j.id != id);
        if self.jobs.is_empty() {
            self.next_id = 1;
        }
    }

    /// One-shot notifications for jobs whose state changed; `Done` jobs
    /// are dropped from the table after being reported.
    pub fn notifications(&mut self) -> Vec<String> {
        let current = self.jobs.last().map(|j| j.id);
        let mut lines = Vec::new();
        let mut done_ids = Vec::new();
        for job in &mut self.jobs {
            if job.notified {
                continue;
            }
            let mark = if Some(job.id) == current { '+' } else { '-' };
            match job.state() {
                JobState::Done => {
                    let status = job.exit_status();
                    let what = if status == 0 {
                        "Done".to_string()
                    } else {
                        format!("Exit {status}")
                    };
                    lines.push(format!("[{}]{} {}\t{}", job.id, mark, what, job.text));
                    job.notified = true;
                    done_ids.push(job.id);
                }
                JobState::Stopped => {
                    lines.push(format!("[{}]{} Stopped\t{}", job.id, mark, job.text));
                    job.notified = true;
                }
                JobState::Running => {}
            }
        }
        for id in done_ids {
            self.remove(id);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_transitions() {
        let mut table = JobTable::new();
        let pid = Pid::from_raw(4242);
        let id = table.add(pid, vec![pid], "sleep 100".into());
        assert_eq!(table.get(id).unwrap().state(), JobState::Running);

        table.record(pid, WaitStatus::Exited(pid, 0));
        assert_eq!(table.get(id).unwrap().state(), JobState::Done);

        let notes = table.notifications();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("[1]+ Done"));
        // Done jobs leave the table after being reported, once.
        assert!(table.is_empty());
        assert!(table.notifications().is_empty());
    }

    #[test]
    fn job_spec_resolution() {
        let mut table = JobTable::new();
        let p1 = Pid::from_raw(10);
        let p2 = Pid::from_raw(20);
        table.add(p1, vec![p1], "one".into());
        table.add(p2, vec![p2], "two".into());
        assert_eq!(table.resolve("%1").unwrap().text, "one");
        assert_eq!(table.resolve("%%").unwrap().text, "two");
        assert_eq!(table.resolve("%-").unwrap().text, "one");
        assert_eq!(table.resolve("2").unwrap().text, "two");
    }

    #[test]
    fn exit_status_is_last_process() {
        let mut table = JobTable::new();
        let p1 = Pid::from_raw(10);
        let p2 = Pid::from_raw(20);
        let id = table.add(p1, vec![p1, p2], "a | b".into());
        table.record(p1, WaitStatus::Exited(p1, 1));
        table.record(p2, WaitStatus::Exited(p2, 0));
        assert_eq!(table.get(id).unwrap().exit_status(), 0);
    }
}
