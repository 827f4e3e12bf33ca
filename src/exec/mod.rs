//! Executor
//!
//! A visitor over the AST: each node kind routes to a handler, simple
//! commands go through the strategy chain, and every fork funnels
//! through the process launcher. Control flow (`break`, `continue`,
//! `return`, `exit`) travels as error variants so it unwinds the
//! execution stack without special cases at every level.

pub mod control;
pub mod pipeline;
pub mod redirect;
pub mod strategy;

use thiserror::Error;

use crate::ast::types::*;
use crate::expand::ExpandError;
use crate::process::launcher::{self, ProcessConfig, ProcessRole};
use crate::process::{fd, signals};
use crate::shell::Shell;
use crate::var::VarError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("break: only meaningful in a `for', `while', or `until' loop")]
    Break(u32),
    #[error("continue: only meaningful in a `for', `while', or `until' loop")]
    Continue(u32),
    #[error("return: can only `return' from a function or sourced script")]
    Return(i32),
    /// Terminate the shell with the given status. Also carries errexit
    /// aborts and fatal special-builtin failures.
    #[error("exit")]
    Exit(i32),
    #[error("{0}")]
    Expansion(#[from] ExpandError),
    #[error("{0}")]
    Var(#[from] VarError),
    #[error("{0}")]
    Redirect(String),
}

/// Execute a whole parsed script.
pub fn run_script(shell: &mut Shell, script: &ScriptNode) -> Result<i32, ExecError> {
    let mut status = shell.last_status;
    for stmt in &script.statements {
        status = exec_statement(shell, stmt)?;
    }
    Ok(status)
}

/// Lex, parse, and run a source string in the current shell (used by
/// `eval`, `.`/`source`, traps, and aliases). A syntax error reports and
/// yields status 2 without unwinding.
pub fn run_source_str(shell: &mut Shell, text: &str) -> Result<i32, ExecError> {
    let parsed = if shell.opts.posix {
        crate::parser::parse_posix(text)
    } else {
        crate::parser::parse(text)
    };
    match parsed {
        Ok(script) => run_script(shell, &script),
        Err(e) => {
            eprintln!("marsh: {e}");
            Ok(2)
        }
    }
}

/// Execute one statement: an and-or list, possibly asynchronous.
pub fn exec_statement(shell: &mut Shell, stmt: &StatementNode) -> Result<i32, ExecError> {
    run_pending_traps(shell)?;

    if shell.opts.noexec {
        return Ok(0);
    }

    if stmt.background {
        return launch_background(shell, stmt);
    }

    let n = stmt.pipelines.len();
    let mut status = exec_pipeline_node(shell, &stmt.pipelines[0])?;
    shell.last_status = status;
    let mut producer = 0usize;
    for (i, op) in stmt.operators.iter().enumerate() {
        let run = match op {
            AndOrOp::And => status == 0,
            AndOrOp::Or => status != 0,
        };
        if run {
            status = exec_pipeline_node(shell, &stmt.pipelines[i + 1])?;
            shell.last_status = status;
            producer = i + 1;
        }
    }

    // errexit fires on an unguarded failure: the status must come from
    // the final element of the list, unnegated, outside any condition.
    let guarded = producer < n - 1
        || stmt.pipelines[producer].negated
        || shell.condition_depth > 0;
    if shell.opts.errexit && status != 0 && !guarded {
        return Err(ExecError::Exit(status));
    }
    Ok(status)
}

/// Run an and-or list in the background as one job.
fn launch_background(shell: &mut Shell, stmt: &StatementNode) -> Result<i32, ExecError> {
    let mut foreground_copy = stmt.clone();
    foreground_copy.background = false;
    let cfg = ProcessConfig {
        role: ProcessRole::Single,
        pgid_hint: None,
        foreground: false,
        is_shell_process: true,
        stdin: None,
        stdout: None,
        close_fds: Vec::new(),
    };
    let pid = launcher::launch(shell, &cfg, move |sh| {
        sh.enter_subshell();
        match exec_statement(sh, &foreground_copy) {
            Ok(status) => status,
            Err(flow) => flow_exit_status(sh, flow),
        }
    })
    .map_err(|e| ExecError::Redirect(e.to_string()))?;

    let id = shell.jobs.add(pid, vec![pid], stmt.source_text.clone());
    shell.last_bg_pid = Some(pid);
    if shell.opts.interactive {
        eprintln!("[{id}] {pid}");
    }
    Ok(0)
}

/// Execute one pipeline, applying `!` negation.
pub fn exec_pipeline_node(shell: &mut Shell, pl: &PipelineNode) -> Result<i32, ExecError> {
    let status = if pl.commands.len() == 1 {
        exec_command(shell, &pl.commands[0])?
    } else {
        pipeline::exec_pipeline(shell, pl)?
    };
    Ok(if pl.negated {
        i32::from(status == 0)
    } else {
        status
    })
}

/// The visitor proper: dispatch on the node tag.
pub fn exec_command(shell: &mut Shell, cmd: &CommandNode) -> Result<i32, ExecError> {
    match cmd {
        CommandNode::Simple(node) => strategy::exec_simple(shell, node),
        CommandNode::If(node) => control::exec_if(shell, node),
        CommandNode::While(node) => control::exec_while(shell, node),
        CommandNode::Until(node) => control::exec_until(shell, node),
        CommandNode::For(node) => control::exec_for(shell, node),
        CommandNode::Case(node) => control::exec_case(shell, node),
        CommandNode::Select(node) => control::exec_select(shell, node),
        CommandNode::Subshell(node) => control::exec_subshell(shell, node),
        CommandNode::Group(node) => control::exec_group(shell, node),
        CommandNode::FunctionDef(node) => {
            shell
                .functions
                .insert(node.name.clone(), node.clone());
            Ok(0)
        }
    }
}

/// Call a defined function with the given arguments.
pub fn call_function(
    shell: &mut Shell,
    def: &FunctionDefNode,
    args: Vec<String>,
) -> Result<i32, ExecError> {
    shell.vars.push_scope();
    shell.push_positional(args);
    shell.func_depth += 1;
    // break/continue do not cross function boundaries.
    let saved_loops = std::mem::replace(&mut shell.loop_depth, 0);

    let result = exec_command(shell, &def.body);

    shell.loop_depth = saved_loops;
    shell.func_depth -= 1;
    shell.pop_positional();
    shell.vars.pop_scope();

    match result {
        Err(ExecError::Return(status)) => Ok(status),
        other => other,
    }
}

/// Run the body of a command substitution and capture its stdout.
pub fn command_substitution_output(
    shell: &mut Shell,
    text: &str,
) -> Result<Vec<u8>, ExecError> {
    let script = crate::parser::parse(text)
        .map_err(|e| ExecError::Expansion(ExpandError::Subst(e.to_string())))?;

    let (r, w) = fd::pipe().map_err(|e| ExecError::Redirect(e.to_string()))?;
    let cfg = ProcessConfig {
        role: ProcessRole::Single,
        pgid_hint: None,
        foreground: true,
        is_shell_process: true,
        stdin: None,
        stdout: Some(w),
        close_fds: vec![r],
    };
    let pid = launcher::launch(shell, &cfg, move |sh| {
        sh.enter_subshell();
        match run_script(sh, &script) {
            Ok(status) => status,
            Err(flow) => flow_exit_status(sh, flow),
        }
    })
    .map_err(|e| ExecError::Redirect(e.to_string()))?;

    fd::close(w);
    launcher::give_terminal_to(shell, pid);
    let output = fd::read_to_end(r).unwrap_or_default();
    fd::close(r);
    let status = launcher::wait_for_child(shell, pid, text);
    launcher::reclaim_terminal(shell);

    shell.last_status = status;
    shell.last_subst_status = Some(status);
    Ok(output)
}

/// Convert a control-flow error escaping a forked child into that
/// child's exit status, reporting what needs reporting.
pub fn flow_exit_status(shell: &mut Shell, flow: ExecError) -> i32 {
    match flow {
        ExecError::Exit(status) | ExecError::Return(status) => status,
        ExecError::Break(_) | ExecError::Continue(_) => 0,
        ExecError::Expansion(e) => {
            eprintln!("marsh: {e}");
            1
        }
        ExecError::Var(e) => {
            eprintln!("marsh: {e}");
            1
        }
        ExecError::Redirect(e) => {
            eprintln!("marsh: {e}");
            1
        }
    }
}

/// Run trap actions for signals that arrived since the last command.
/// `$?` is preserved around the actions.
pub fn run_pending_traps(shell: &mut Shell) -> Result<(), ExecError> {
    let pending = shell.traps.pending_commands();
    if pending.is_empty() {
        return Ok(());
    }
    let saved_status = shell.last_status;
    for (_sig, action) in pending {
        run_source_str(shell, &action)?;
    }
    shell.last_status = saved_status;
    Ok(())
}

/// Run the EXIT trap, if any, exactly once.
pub fn run_exit_trap(shell: &mut Shell) {
    if let Some(action) = shell.traps.exit_command() {
        // Clear it first so an exit inside the trap does not recurse.
        let _ = shell
            .traps
            .set_trap(0, signals::TrapAction::Default);
        let _ = run_source_str(shell, &action);
    }
}

/// Reap finished children and print one-shot job notifications. Called
/// at executor boundaries (the prompt, and between top-level commands in
/// scripts).
pub fn notice_jobs(shell: &mut Shell) {
    if shell.jobs.is_empty() {
        return;
    }
    shell.jobs.reap();
    for line in shell.jobs.notifications() {
        eprintln!("{line}");
    }
}
