//! eval, source (.), exec

use std::ffi::CString;

use crate::exec::strategy::{find_command, Found};
use crate::exec::{run_source_str, ExecError};
use crate::shell::Shell;

pub fn eval_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    if args.is_empty() {
        return Ok(0);
    }
    let source = args.join(" ");
    run_source_str(shell, &source)
}

/// `. file [args...]` — run the file in the current shell environment.
pub fn source(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let path_arg = match args.first() {
        Some(path) => path,
        None => {
            eprintln!("marsh: .: filename argument required");
            return Ok(2);
        }
    };

    let path = resolve_script(shell, path_arg);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("marsh: .: {path_arg}: {e}");
            return Ok(1);
        }
    };

    let replaced_positional = if args.len() > 1 {
        Some(std::mem::replace(
            &mut shell.positional,
            args[1..].to_vec(),
        ))
    } else {
        None
    };

    shell.source_depth += 1;
    let result = run_source_str(shell, &text);
    shell.source_depth -= 1;

    if let Some(saved) = replaced_positional {
        shell.positional = saved;
    }

    match result {
        Err(ExecError::Return(status)) => Ok(status),
        other => other,
    }
}

/// A sourced path without a slash is searched on PATH, then in the
/// current directory.
fn resolve_script(shell: &Shell, name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }
    if let Found::Path(path) = find_command(shell, name) {
        return path;
    }
    name.to_string()
}

/// `exec command [args...]` — replace the shell without forking. The
/// no-argument form is handled by the strategy chain, which makes the
/// redirections permanent.
pub fn exec_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let name = match args.first() {
        Some(name) => name.clone(),
        None => return Ok(0),
    };

    let path = match find_command(shell, &name) {
        Found::Path(path) => path,
        Found::NotExecutable(path) => {
            eprintln!("marsh: exec: {path}: Permission denied");
            return exec_failure(shell, 126);
        }
        Found::NotFound => {
            eprintln!("marsh: exec: {name}: command not found");
            return exec_failure(shell, 127);
        }
    };

    let c_path = match CString::new(path.clone()) {
        Ok(p) => p,
        Err(_) => return exec_failure(shell, 127),
    };
    let c_argv: Vec<CString> = args
        .iter()
        .filter_map(|a| CString::new(a.as_str()).ok())
        .collect();
    let c_env: Vec<CString> = shell
        .child_environment()
        .iter()
        .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
        .collect();

    crate::process::signals::reset_for_child(false);
    match nix::unistd::execve(&c_path, &c_argv, &c_env) {
        Err(nix::errno::Errno::ENOENT) => {
            eprintln!("marsh: exec: {path}: No such file or directory");
            exec_failure(shell, 127)
        }
        Err(nix::errno::Errno::EACCES) => {
            eprintln!("marsh: exec: {path}: Permission denied");
            exec_failure(shell, 126)
        }
        Err(e) => {
            eprintln!("marsh: exec: {path}: {e}");
            exec_failure(shell, 126)
        }
        Ok(_) => unreachable!("execve returned Ok"),
    }
}

/// A failed exec terminates a non-interactive shell.
fn exec_failure(shell: &Shell, status: i32) -> Result<i32, ExecError> {
    if shell.opts.interactive {
        Ok(status)
    } else {
        Err(ExecError::Exit(status))
    }
}
