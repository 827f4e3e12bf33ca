//! Shell context
//!
//! The single explicit state value threaded through the lexer driver,
//! expansion pipeline, and executor. The shell process exclusively owns
//! the variable store, function table, alias table, job table, and trap
//! table; subshells receive a copy and their mutations never propagate
//! back.

use std::collections::{HashMap, HashSet};

use nix::unistd::Pid;

use crate::ast::types::FunctionDefNode;
use crate::history::History;
use crate::process::job::JobTable;
use crate::process::signals::TrapState;
use crate::var::special::DynamicVars;
use crate::var::VarStore;

/// Option flags settable from the command line and `set`.
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    pub errexit: bool,   // -e
    pub nounset: bool,   // -u
    pub xtrace: bool,    // -x
    pub noglob: bool,    // -f
    pub verbose: bool,   // -v
    pub noexec: bool,    // -n
    pub pipefail: bool,  // -o pipefail
    pub posix: bool,     // --posix
    pub interactive: bool,
    pub login: bool,
    /// Job control (process groups, terminal handoff).
    pub monitor: bool,
    // shopt-style glob options
    pub nullglob: bool,
    pub failglob: bool,
    pub dotglob: bool,
}

impl ShellOptions {
    /// The value of `$-`.
    pub fn flag_string(&self) -> String {
        let mut s = String::new();
        if self.errexit {
            s.push('e');
        }
        if self.noglob {
            s.push('f');
        }
        if self.interactive {
            s.push('i');
        }
        if self.monitor {
            s.push('m');
        }
        if self.noexec {
            s.push('n');
        }
        if self.nounset {
            s.push('u');
        }
        if self.verbose {
            s.push('v');
        }
        if self.xtrace {
            s.push('x');
        }
        s
    }

    /// Look up a `-o` option name. Returns a mutable reference so `set`
    /// can flip it.
    pub fn by_name(&mut self, name: &str) -> Option<&mut bool> {
        match name {
            "errexit" => Some(&mut self.errexit),
            "nounset" => Some(&mut self.nounset),
            "xtrace" => Some(&mut self.xtrace),
            "noglob" => Some(&mut self.noglob),
            "verbose" => Some(&mut self.verbose),
            "noexec" => Some(&mut self.noexec),
            "pipefail" => Some(&mut self.pipefail),
            "posix" => Some(&mut self.posix),
            "monitor" => Some(&mut self.monitor),
            _ => None,
        }
    }

    pub const OPTION_NAMES: &'static [&'static str] = &[
        "errexit", "monitor", "noexec", "noglob", "nounset", "pipefail", "posix", "verbose",
        "xtrace",
    ];
}

/// The whole interpreter state.
pub struct Shell {
    pub vars: VarStore,
    pub dynamic: DynamicVars,
    pub functions: HashMap<String, FunctionDefNode>,
    pub aliases: HashMap<String, String>,
    pub jobs: JobTable,
    pub traps: TrapState,
    pub opts: ShellOptions,
    /// `$0`.
    pub arg0: String,
    /// Current positional parameters (`$1`...).
    pub positional: Vec<String>,
    /// Saved positional frames for nested function calls.
    positional_stack: Vec<Vec<String>>,
    /// `$?`.
    pub last_status: i32,
    /// `$!`.
    pub last_bg_pid: Option<Pid>,
    /// Our own pid (`$$`); a subshell keeps reporting its parent's.
    pub pid: Pid,
    /// Process group owning the terminal when the shell started.
    pub shell_pgid: Pid,
    /// Nesting depth of enclosing loops, for `break`/`continue` checks.
    pub loop_depth: u32,
    /// Nesting depth of function calls.
    pub func_depth: u32,
    /// Non-zero while evaluating an `if`/`while`/`until` condition, where
    /// errexit does not apply.
    pub condition_depth: u32,
    /// Nesting depth of `.`/`source`, where `return` is allowed.
    pub source_depth: u32,
    /// Exit status of the last command substitution in the current simple
    /// command; an assignment-only command reports it.
    pub last_subst_status: Option<i32>,
    /// Alias names currently being expanded, to stop recursion.
    pub expanding_aliases: HashSet<String>,
    /// True in a forked copy of the shell.
    pub is_subshell: bool,
    pub history: History,
}

impl Shell {
    pub fn new(opts: ShellOptions) -> Self {
        let mut vars = VarStore::from_environment();
        seed_default_vars(&mut vars);
        Shell {
            vars,
            dynamic: DynamicVars::new(),
            functions: HashMap::new(),
            aliases: HashMap::new(),
            jobs: JobTable::new(),
            traps: TrapState::new(),
            opts,
            arg0: "marsh".to_string(),
            positional: Vec::new(),
            positional_stack: Vec::new(),
            last_status: 0,
            last_bg_pid: None,
            pid: nix::unistd::getpid(),
            shell_pgid: nix::unistd::getpgrp(),
            loop_depth: 0,
            func_depth: 0,
            condition_depth: 0,
            source_depth: 0,
            last_subst_status: None,
            expanding_aliases: HashSet::new(),
            is_subshell: false,
            history: History::new(),
        }
    }

    /// The IFS in effect; unset means the space-tab-newline default.
    pub fn ifs(&self) -> String {
        match self.vars.get_scalar("IFS") {
            Some(s) => s.to_string(),
            None => " \t\n".to_string(),
        }
    }

    /// First character of IFS, for joining `"$*"`. Unset IFS joins with
    /// space; empty IFS joins with nothing.
    pub fn ifs_join(&self) -> String {
        match self.vars.get_scalar("IFS") {
            None => " ".to_string(),
            Some(s) => s.chars().next().map(String::from).unwrap_or_default(),
        }
    }

    /// Push a fresh positional frame for a function call.
    pub fn push_positional(&mut self, args: Vec<String>) {
        self.positional_stack
            .push(std::mem::replace(&mut self.positional, args));
    }

    pub fn pop_positional(&mut self) {
        if let Some(saved) = self.positional_stack.pop() {
            self.positional = saved;
        }
    }

    /// Environment for a child process: exported variables over the
    /// inherited environment (the store was seeded from it), plus any
    /// command-local assignments the caller merges on top.
    pub fn child_environment(&self) -> Vec<(String, String)> {
        self.vars.environment()
    }

    /// Mark the shell state as a forked subshell copy. Job control stays
    /// with the parent: nested forks keep the subshell's process group
    /// and never touch the terminal.
    pub fn enter_subshell(&mut self) {
        self.is_subshell = true;
        self.opts.monitor = false;
        self.jobs.clear();
        self.traps.reset_handlers();
    }

    /// Print an `-x` trace line for an expanded command.
    pub fn xtrace(&mut self, argv: &[String]) {
        if !self.opts.xtrace {
            return;
        }
        let ps4 = self
            .vars
            .get_scalar("PS4")
            .unwrap_or("+ ")
            .to_string();
        eprintln!("{}{}", ps4, argv.join(" "));
    }
}

/// Defaults for variables the shell maintains itself.
fn seed_default_vars(vars: &mut VarStore) {
    if vars.get("PATH").is_none() {
        let _ = vars.set_scalar("PATH", "/usr/local/bin:/usr/bin:/bin", false);
        vars.set_exported("PATH", true);
    }
    if vars.get("PS1").is_none() {
        let _ = vars.set_scalar("PS1", r"\u@\h:\w\$ ", false);
    }
    if vars.get("PS2").is_none() {
        let _ = vars.set_scalar("PS2", "> ", false);
    }
    if let Ok(cwd) = std::env::current_dir() {
        let _ = vars.set_scalar("PWD", cwd.to_string_lossy(), false);
        vars.set_exported("PWD", true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_string_reflects_options() {
        let mut opts = ShellOptions::default();
        opts.errexit = true;
        opts.xtrace = true;
        assert_eq!(opts.flag_string(), "ex");
    }

    #[test]
    fn positional_frames_nest() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.positional = vec!["a".into()];
        shell.push_positional(vec!["b".into(), "c".into()]);
        assert_eq!(shell.positional, vec!["b".to_string(), "c".to_string()]);
        shell.pop_positional();
        assert_eq!(shell.positional, vec!["a".to_string()]);
    }

    #[test]
    fn default_ifs() {
        let shell = Shell::new(ShellOptions::default());
        assert_eq!(shell.ifs(), " \t\n");
        assert_eq!(shell.ifs_join(), " ");
    }
}
