//! Signal dispositions and traps
//!
//! Trap actions run between commands, never reentrantly inside one: the
//! signal handler only records the signal number, and the executor asks
//! for pending signals at command boundaries. Children always reset
//! dispositions to default before running their action; the sole
//! exception is `SIGTTOU`, kept ignored when the forked child goes on
//! running shell code so it can call `tcsetpgrp` without being stopped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

const MAX_SIGNAL: usize = 64;

static ANY_PENDING: AtomicBool = AtomicBool::new(false);
static PENDING: [AtomicBool; MAX_SIGNAL + 1] =
    [const { AtomicBool::new(false) }; MAX_SIGNAL + 1];

extern "C" fn note_signal(sig: libc::c_int) {
    let sig = sig as usize;
    if sig <= MAX_SIGNAL {
        PENDING[sig].store(true, Ordering::SeqCst);
        ANY_PENDING.store(true, Ordering::SeqCst);
    }
}

/// What to do when a signal arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapAction {
    Default,
    Ignore,
    Command(String),
}

/// The shell-level trap table. Key 0 is the EXIT trap.
#[derive(Debug, Clone, Default)]
pub struct TrapState {
    actions: HashMap<i32, TrapAction>,
}

impl TrapState {
    pub fn new() -> Self {
        TrapState::default()
    }

    /// Install a trap and the matching process disposition.
    pub fn set_trap(&mut self, sig: i32, action: TrapAction) -> nix::Result<()> {
        if sig != 0 {
            let signal = Signal::try_from(sig)?;
            let handler = match &action {
                TrapAction::Default => SigHandler::SigDfl,
                TrapAction::Ignore => SigHandler::SigIgn,
                TrapAction::Command(_) => SigHandler::Handler(note_signal),
            };
            install(signal, handler)?;
        }
        if action == TrapAction::Default {
            self.actions.remove(&sig);
        } else {
            self.actions.insert(sig, action);
        }
        Ok(())
    }

    pub fn get(&self, sig: i32) -> Option<&TrapAction> {
        self.actions.get(&sig)
    }

    /// Trap commands to run, in signal-number order, for the signals that
    /// arrived since the last call.
    pub fn pending_commands(&self) -> Vec<(i32, String)> {
        if !ANY_PENDING.swap(false, Ordering::SeqCst) {
            return Vec::new();
        }
        let mut out = Vec::new();
        for sig in 1..=MAX_SIGNAL {
            if PENDING[sig].swap(false, Ordering::SeqCst) {
                if let Some(TrapAction::Command(cmd)) = self.actions.get(&(sig as i32)) {
                    out.push((sig as i32, cmd.clone()));
                }
            }
        }
        out
    }

    /// The EXIT trap command, if one is set.
    pub fn exit_command(&self) -> Option<String> {
        match self.actions.get(&0) {
            Some(TrapAction::Command(cmd)) => Some(cmd.clone()),
            _ => None,
        }
    }

    /// Entries for `trap` with no arguments.
    pub fn listing(&self) -> Vec<(i32, String)> {
        let mut out: Vec<(i32, String)> = self
            .actions
            .iter()
            .filter_map(|(sig, act)| match act {
                TrapAction::Command(cmd) => Some((*sig, cmd.clone())),
                TrapAction::Ignore => Some((*sig, String::new())),
                TrapAction::Default => None,
            })
            .collect();
        out.sort_by_key(|(sig, _)| *sig);
        out
    }

    /// On entering a subshell, traps other than ignore revert to default.
    pub fn reset_handlers(&mut self) {
        self.actions.retain(|_, act| *act == TrapAction::Ignore);
    }

    /// True when a SIGINT arrived and no trap consumed it.
    pub fn take_interrupt(&self) -> bool {
        if self.actions.contains_key(&(Signal::SIGINT as i32)) {
            return false;
        }
        PENDING[Signal::SIGINT as usize].swap(false, Ordering::SeqCst)
    }
}

fn install(signal: Signal, handler: SigHandler) -> nix::Result<()> {
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    unsafe { sigaction(signal, &action) }?;
    Ok(())
}

/// Dispositions for an interactive shell: keyboard signals must not kill
/// the shell, and job control needs `SIGTTOU` ignored for `tcsetpgrp`.
pub fn init_interactive() -> nix::Result<()> {
    install(Signal::SIGINT, SigHandler::Handler(note_signal))?;
    install(Signal::SIGQUIT, SigHandler::SigIgn)?;
    install(Signal::SIGTSTP, SigHandler::SigIgn)?;
    install(Signal::SIGTTIN, SigHandler::SigIgn)?;
    install(Signal::SIGTTOU, SigHandler::SigIgn)?;
    install(Signal::SIGPIPE, SigHandler::SigIgn)?;
    Ok(())
}

/// Dispositions for a non-interactive shell.
pub fn init_noninteractive() -> nix::Result<()> {
    install(Signal::SIGPIPE, SigHandler::SigIgn)?;
    install(Signal::SIGTTOU, SigHandler::SigIgn)?;
    Ok(())
}

/// Signals a child resets to default before running its action.
const CHILD_RESET: &[Signal] = &[
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGPIPE,
    Signal::SIGCHLD,
];

/// Reset dispositions in a freshly forked child. `is_shell_process` keeps
/// `SIGTTOU` ignored so a subshell managing terminal control is not
/// stopped by its own `tcsetpgrp`.
pub fn reset_for_child(is_shell_process: bool) {
    for &sig in CHILD_RESET {
        let _ = install(sig, SigHandler::SigDfl);
    }
    if is_shell_process {
        let _ = install(Signal::SIGTTOU, SigHandler::SigIgn);
        let _ = install(Signal::SIGPIPE, SigHandler::SigIgn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_table_listing() {
        let mut traps = TrapState::new();
        traps
            .set_trap(0, TrapAction::Command("echo bye".into()))
            .unwrap();
        assert_eq!(traps.exit_command().as_deref(), Some("echo bye"));
        assert_eq!(traps.listing(), vec![(0, "echo bye".to_string())]);
        traps.set_trap(0, TrapAction::Default).unwrap();
        assert!(traps.exit_command().is_none());
    }

    #[test]
    fn subshell_reset_keeps_ignores() {
        let mut traps = TrapState::new();
        traps.actions.insert(15, TrapAction::Command("x".into()));
        traps.actions.insert(3, TrapAction::Ignore);
        traps.reset_handlers();
        assert_eq!(traps.get(15), None);
        assert_eq!(traps.get(3), Some(&TrapAction::Ignore));
    }
}
