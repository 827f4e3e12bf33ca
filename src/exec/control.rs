//! Control flow
//!
//! Handlers for the compound commands. `break N` and `continue N` unwind
//! exactly N enclosing loops by decrementing their count as they
//! propagate; a guard's exit status never triggers errexit because the
//! statement executor tracks the condition depth.

use crate::ast::types::*;
use crate::exec::redirect::apply_redirections;
use crate::exec::{
    exec_statement, flow_exit_status, run_script, ExecError,
};
use crate::expand::{
    expand_word, expand_word_keep_marks, expand_word_single, pattern,
};
use crate::process::launcher::{self, ProcessConfig, ProcessRole};
use crate::shell::Shell;

/// Run a statement list; the status is the last statement's, or 0 when
/// the list is empty.
fn exec_body(shell: &mut Shell, body: &[StatementNode]) -> Result<i32, ExecError> {
    let mut status = 0;
    for stmt in body {
        status = exec_statement(shell, stmt)?;
    }
    Ok(status)
}

/// Evaluate a guard list with errexit suspended.
fn exec_condition(shell: &mut Shell, cond: &[StatementNode]) -> Result<i32, ExecError> {
    shell.condition_depth += 1;
    let result = exec_body(shell, cond);
    shell.condition_depth -= 1;
    result
}

pub fn exec_if(shell: &mut Shell, node: &IfNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    for clause in &node.clauses {
        if exec_condition(shell, &clause.condition)? == 0 {
            return exec_body(shell, &clause.body);
        }
    }
    match &node.else_body {
        Some(body) => exec_body(shell, body),
        None => Ok(0),
    }
}

pub fn exec_while(shell: &mut Shell, node: &WhileNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    run_loop(shell, &node.condition, &node.body, false)
}

pub fn exec_until(shell: &mut Shell, node: &UntilNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    run_loop(shell, &node.condition, &node.body, true)
}

fn run_loop(
    shell: &mut Shell,
    condition: &[StatementNode],
    body: &[StatementNode],
    until: bool,
) -> Result<i32, ExecError> {
    shell.loop_depth += 1;
    let mut status = 0;
    let result = loop {
        let guard = match exec_condition(shell, condition) {
            Ok(s) => s,
            Err(e) => break Err(e),
        };
        let proceed = if until { guard != 0 } else { guard == 0 };
        if !proceed {
            break Ok(status);
        }
        match exec_body(shell, body) {
            Ok(s) => status = s,
            Err(ExecError::Break(n)) => {
                if n > 1 {
                    break Err(ExecError::Break(n - 1));
                }
                break Ok(status);
            }
            Err(ExecError::Continue(n)) => {
                if n > 1 {
                    break Err(ExecError::Continue(n - 1));
                }
            }
            Err(e) => break Err(e),
        }
    };
    shell.loop_depth -= 1;
    result
}

pub fn exec_for(shell: &mut Shell, node: &ForNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    let items: Vec<String> = match &node.words {
        Some(words) => {
            let mut items = Vec::new();
            for word in words {
                items.extend(expand_word(shell, word)?);
            }
            items
        }
        None => shell.positional.clone(),
    };

    shell.loop_depth += 1;
    let mut status = 0;
    let mut result = Ok(());
    'outer: for item in items {
        if let Err(e) = shell.vars.set_scalar(&node.variable, item, false) {
            result = Err(ExecError::Var(e));
            break;
        }
        match exec_body(shell, &node.body) {
            Ok(s) => status = s,
            Err(ExecError::Break(n)) => {
                if n > 1 {
                    result = Err(ExecError::Break(n - 1));
                }
                break 'outer;
            }
            Err(ExecError::Continue(n)) => {
                if n > 1 {
                    result = Err(ExecError::Continue(n - 1));
                    break 'outer;
                }
            }
            Err(e) => {
                result = Err(e);
                break 'outer;
            }
        }
    }
    shell.loop_depth -= 1;
    result.map(|()| status)
}

pub fn exec_case(shell: &mut Shell, node: &CaseNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    let subject = expand_word_single(shell, &node.word)?;

    let mut status = 0;
    let mut fall_through = false;
    for item in &node.items {
        let matched = fall_through
            || item.patterns.iter().any(|p| {
                match expand_word_keep_marks(shell, p) {
                    Ok(pat) => pattern::matches(&pat, &subject),
                    Err(_) => false,
                }
            });
        if !matched {
            continue;
        }
        status = exec_body(shell, &item.body)?;
        match item.terminator {
            CaseTerminator::Break => return Ok(status),
            CaseTerminator::FallThrough => fall_through = true,
            CaseTerminator::TestNext => fall_through = false,
        }
    }
    Ok(status)
}

pub fn exec_select(shell: &mut Shell, node: &SelectNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    let items: Vec<String> = match &node.words {
        Some(words) => {
            let mut items = Vec::new();
            for word in words {
                items.extend(expand_word(shell, word)?);
            }
            items
        }
        None => shell.positional.clone(),
    };
    if items.is_empty() {
        return Ok(0);
    }

    let ps3 = shell
        .vars
        .get_scalar("PS3")
        .unwrap_or("#? ")
        .to_string();

    shell.loop_depth += 1;
    let mut status = 0;
    let result = loop {
        for (i, item) in items.iter().enumerate() {
            eprintln!("{}) {}", i + 1, item);
        }
        eprint!("{ps3}");
        let mut line = String::new();
        match std::io::BufRead::read_line(&mut std::io::stdin().lock(), &mut line) {
            Ok(0) | Err(_) => break Ok(status),
            Ok(_) => {}
        }
        let reply = line.trim().to_string();
        if reply.is_empty() {
            continue;
        }
        let chosen = reply
            .parse::<usize>()
            .ok()
            .and_then(|n| items.get(n.wrapping_sub(1)))
            .cloned()
            .unwrap_or_default();
        if let Err(e) = shell.vars.set_scalar("REPLY", &reply, false) {
            break Err(ExecError::Var(e));
        }
        if let Err(e) = shell.vars.set_scalar(&node.variable, chosen, false) {
            break Err(ExecError::Var(e));
        }
        match exec_body(shell, &node.body) {
            Ok(s) => status = s,
            Err(ExecError::Break(n)) => {
                if n > 1 {
                    break Err(ExecError::Break(n - 1));
                }
                break Ok(status);
            }
            Err(ExecError::Continue(n)) => {
                if n > 1 {
                    break Err(ExecError::Continue(n - 1));
                }
            }
            Err(e) => break Err(e),
        }
    };
    shell.loop_depth -= 1;
    result
}

/// `( ... )`: fork; the child runs the body in an isolated copy of the
/// shell state.
pub fn exec_subshell(shell: &mut Shell, node: &SubshellNode) -> Result<i32, ExecError> {
    let body = node.body.clone();
    let redirs = node.redirections.clone();
    let cfg = ProcessConfig {
        role: ProcessRole::Single,
        pgid_hint: None,
        foreground: true,
        is_shell_process: true,
        stdin: None,
        stdout: None,
        close_fds: Vec::new(),
    };
    let pid = launcher::launch(shell, &cfg, move |sh| {
        sh.enter_subshell();
        if let Err(e) = crate::exec::redirect::apply_in_child(sh, &redirs) {
            eprintln!("marsh: {e}");
            return 1;
        }
        match run_script(
            sh,
            &ScriptNode {
                statements: body,
            },
        ) {
            Ok(status) => status,
            Err(flow) => flow_exit_status(sh, flow),
        }
    })
    .map_err(|e| ExecError::Redirect(e.to_string()))?;

    launcher::give_terminal_to(shell, pid);
    let status = launcher::wait_for_child(shell, pid, "( ... )");
    launcher::reclaim_terminal(shell);
    Ok(status)
}

/// `{ ...; }`: no fork, but its own redirection scope.
pub fn exec_group(shell: &mut Shell, node: &GroupNode) -> Result<i32, ExecError> {
    let _guard = apply_redirections(shell, &node.redirections)?;
    exec_body(shell, &node.body)
}
