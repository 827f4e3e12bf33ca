//! Simple-command execution
//!
//! The strategy chain, in priority order: special built-in, regular
//! built-in, function, alias, external command. Assignments are applied
//! left to right before the command's words expand, so earlier
//! assignments are visible to later expansions on the same command; they
//! persist only when no command name follows (or the command is a POSIX
//! special built-in).

use std::ffi::CString;

use nix::unistd::AccessFlags;

use crate::ast::types::{AssignmentNode, SimpleCommandNode};
use crate::builtins;
use crate::exec::redirect::{apply_in_child, apply_redirections, RedirGuard};
use crate::exec::{call_function, run_source_str, ExecError};
use crate::expand::arith::eval_arith;
use crate::expand::{expand_assignment_value, expand_word, expand_words};
use crate::process::launcher::{self, ProcessConfig};
use crate::shell::Shell;
use crate::var::{Subscript, Variable};

/// Saved bindings for assignments that are temporary to one command.
pub struct TempVars {
    saved: Vec<(String, Option<Variable>)>,
}

impl TempVars {
    fn restore(self, shell: &mut Shell) {
        for (name, snapshot) in self.saved.into_iter().rev() {
            shell.vars.restore_binding(&name, snapshot);
        }
    }

    /// Keep the assignments: used when they turn out to be permanent.
    fn forget(self) {}
}

pub fn exec_simple(shell: &mut Shell, node: &SimpleCommandNode) -> Result<i32, ExecError> {
    shell.last_subst_status = None;

    // Assignment-only command: assignments mutate the current scope.
    if node.words.is_empty() {
        let guard = match bind_redirections(shell, node)? {
            Some(guard) => Some(guard),
            None => return Ok(1),
        };
        for a in &node.assignments {
            if let Err(e) = apply_assignment(shell, a, false) {
                drop(guard);
                return soft_error(e);
            }
        }
        drop(guard);
        return Ok(shell.last_subst_status.unwrap_or(0));
    }

    // Temporary assignments, applied before the words expand.
    let temps = match apply_temp_assignments(shell, &node.assignments) {
        Ok(temps) => temps,
        Err(e) => return soft_error(e),
    };

    let argv = match expand_words(shell, &node.words) {
        Ok(argv) => argv,
        Err(e) => {
            temps.restore(shell);
            return Err(e.into());
        }
    };

    // The command name expanded away (`$EMPTY`): the assignments become
    // permanent after all.
    if argv.is_empty() {
        temps.restore(shell);
        for a in &node.assignments {
            if let Err(e) = apply_assignment(shell, a, false) {
                return soft_error(e);
            }
        }
        let guard = bind_redirections(shell, node)?;
        drop(guard);
        return Ok(shell.last_subst_status.unwrap_or(0));
    }

    shell.xtrace(&argv);
    let name = argv[0].clone();
    let args = &argv[1..];

    // A bare `exec` makes its redirections permanent: apply them with no
    // restore guard.
    if name == "exec" && args.is_empty() {
        temps.forget();
        if let Err(e) = apply_in_child(shell, &node.redirections) {
            eprintln!("marsh: {e}");
            return Ok(1);
        }
        return Ok(0);
    }

    // 1. Special built-ins. Their assignments persist (POSIX).
    if let Some(builtin) = builtins::find_special(&name) {
        temps.forget();
        let guard = match bind_redirections(shell, node)? {
            Some(guard) => guard,
            None => return Ok(1),
        };
        let status = builtin(shell, args);
        drop(guard);
        return status;
    }

    // 2. Regular built-ins.
    if let Some(builtin) = builtins::find(&name) {
        let guard = match bind_redirections(shell, node)? {
            Some(guard) => Some(guard),
            None => {
                temps.restore(shell);
                return Ok(1);
            }
        };
        let status = builtin(shell, args);
        drop(guard);
        temps.restore(shell);
        return status;
    }

    // 3. Functions.
    if let Some(def) = shell.functions.get(&name).cloned() {
        let guard = match bind_redirections(shell, node)? {
            Some(guard) => Some(guard),
            None => {
                temps.restore(shell);
                return Ok(1);
            }
        };
        let status = call_function(shell, &def, args.to_vec());
        drop(guard);
        temps.restore(shell);
        return status;
    }

    // 4. Aliases: the replacement text is re-tokenized and re-dispatched,
    // at most once per name.
    if shell.aliases.contains_key(&name) && !shell.expanding_aliases.contains(&name) {
        let status = run_alias(shell, &name, args, node);
        temps.restore(shell);
        return status;
    }

    // 5. External command.
    let status = exec_external(shell, &name, &argv, node);
    temps.restore(shell);
    status
}

/// Report a readonly or assignment failure and yield status 1; the value
/// is left unchanged and the shell continues.
fn soft_error(e: ExecError) -> Result<i32, ExecError> {
    match e {
        ExecError::Var(e) => {
            eprintln!("marsh: {e}");
            Ok(1)
        }
        other => Err(other),
    }
}

/// Apply a command's redirections in the shell process. `Ok(None)` means
/// the redirection failed: it was reported, and the command must not run.
fn bind_redirections(
    shell: &mut Shell,
    node: &SimpleCommandNode,
) -> Result<Option<RedirGuard>, ExecError> {
    match apply_redirections(shell, &node.redirections) {
        Ok(guard) => Ok(Some(guard)),
        Err(ExecError::Redirect(msg)) => {
            eprintln!("marsh: {msg}");
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

fn apply_temp_assignments(
    shell: &mut Shell,
    assignments: &[AssignmentNode],
) -> Result<TempVars, ExecError> {
    let mut temps = TempVars { saved: Vec::new() };
    for a in assignments {
        temps.saved.push((a.name.clone(), shell.vars.snapshot(&a.name)));
        match apply_assignment(shell, a, true) {
            Ok(()) => {}
            Err(e) => {
                temps.restore(shell);
                return Err(e);
            }
        }
    }
    Ok(temps)
}

/// Evaluate one assignment. `export_temp` marks the binding exported so
/// a child process sees it.
pub fn apply_assignment(
    shell: &mut Shell,
    a: &AssignmentNode,
    export_temp: bool,
) -> Result<(), ExecError> {
    if let Some(elements) = &a.array {
        let mut values = Vec::new();
        for word in elements {
            values.extend(expand_word(shell, word)?);
        }
        if a.append {
            let mut existing = shell
                .vars
                .get(&a.name)
                .and_then(|v| v.value.as_ref())
                .map(|v| v.elements())
                .unwrap_or_default();
            existing.extend(values);
            shell.vars.set_array(&a.name, existing)?;
        } else {
            shell.vars.set_array(&a.name, values)?;
        }
    } else {
        let mut value = match &a.value {
            Some(word) => expand_assignment_value(shell, word)?,
            None => String::new(),
        };
        if shell
            .vars
            .get(&a.name)
            .map_or(false, |v| v.attributes.integer)
        {
            value = eval_arith(shell, &value)?.to_string();
        }
        match &a.index {
            None => shell.vars.set_scalar(&a.name, value, a.append)?,
            Some(sub) => {
                let subscript = match shell.vars.get(&a.name).and_then(|v| v.value.as_ref()) {
                    Some(crate::var::Value::Assoc(_)) => Subscript::Key(sub.clone()),
                    _ => Subscript::Index(eval_arith(shell, sub)?),
                };
                shell
                    .vars
                    .set_element(&a.name, subscript, value, a.append)?;
            }
        }
    }
    if export_temp {
        shell.vars.set_exported(&a.name, true);
    }
    Ok(())
}

fn run_alias(
    shell: &mut Shell,
    name: &str,
    args: &[String],
    node: &SimpleCommandNode,
) -> Result<i32, ExecError> {
    let mut source = shell.aliases[name].clone();
    for arg in args {
        source.push(' ');
        source.push_str(&quote_single(arg));
    }
    let guard = match bind_redirections(shell, node)? {
        Some(guard) => guard,
        None => return Ok(1),
    };
    shell.expanding_aliases.insert(name.to_string());
    let status = run_source_str(shell, &source);
    shell.expanding_aliases.remove(name);
    drop(guard);
    status
}

/// Single-quote a string so the re-lexed alias text sees it verbatim.
fn quote_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Where PATH search landed.
pub(crate) enum Found {
    Path(String),
    NotExecutable(String),
    NotFound,
}

pub(crate) fn find_command(shell: &Shell, name: &str) -> Found {
    if name.contains('/') {
        return if std::path::Path::new(name).exists() {
            Found::Path(name.to_string())
        } else {
            Found::NotFound
        };
    }
    let path_var = shell.vars.get_scalar("PATH").unwrap_or_default().to_string();
    let mut non_executable = None;
    for dir in path_var.split(':') {
        let dir = if dir.is_empty() { "." } else { dir };
        let candidate = format!("{dir}/{name}");
        let meta = match std::fs::metadata(&candidate) {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        drop(meta);
        if nix::unistd::access(candidate.as_str(), AccessFlags::X_OK).is_ok() {
            return Found::Path(candidate);
        }
        non_executable.get_or_insert(candidate);
    }
    match non_executable {
        Some(path) => Found::NotExecutable(path),
        None => Found::NotFound,
    }
}

/// Strategy 5: fork and exec an external program.
fn exec_external(
    shell: &mut Shell,
    name: &str,
    argv: &[String],
    node: &SimpleCommandNode,
) -> Result<i32, ExecError> {
    let path = match find_command(shell, name) {
        Found::Path(path) => path,
        Found::NotExecutable(path) => {
            eprintln!("marsh: {path}: Permission denied");
            return Ok(126);
        }
        Found::NotFound => {
            eprintln!("marsh: {name}: command not found");
            return Ok(127);
        }
    };

    let env = shell.child_environment();
    let argv = argv.to_vec();
    let redirs = node.redirections.clone();

    let cfg = ProcessConfig::single(true);
    let pid = launcher::launch(shell, &cfg, move |sh| {
        if let Err(e) = apply_in_child(sh, &redirs) {
            eprintln!("marsh: {e}");
            return 1;
        }
        let c_path = match CString::new(path.clone()) {
            Ok(p) => p,
            Err(_) => return 127,
        };
        let c_argv: Vec<CString> = argv
            .iter()
            .filter_map(|a| CString::new(a.as_str()).ok())
            .collect();
        let c_env: Vec<CString> = env
            .iter()
            .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
            .collect();
        match nix::unistd::execve(&c_path, &c_argv, &c_env) {
            Err(nix::errno::Errno::ENOENT) => {
                eprintln!("marsh: {path}: No such file or directory");
                127
            }
            Err(nix::errno::Errno::EACCES) => {
                eprintln!("marsh: {path}: Permission denied");
                126
            }
            Err(e) => {
                eprintln!("marsh: {path}: {e}");
                126
            }
            Ok(_) => unreachable!("execve returned Ok"),
        }
    })
    .map_err(|e| ExecError::Redirect(e.to_string()))?;

    launcher::give_terminal_to(shell, pid);
    let status = launcher::wait_for_child(shell, pid, name);
    launcher::reclaim_terminal(shell);
    Ok(status)
}
