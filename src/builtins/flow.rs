//! Control-flow built-ins: break, continue, return, exit, shift

use crate::exec::ExecError;
use crate::shell::Shell;

fn loop_count(args: &[String]) -> Result<u32, String> {
    match args.first() {
        None => Ok(1),
        Some(arg) => match arg.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(n as u32),
            Ok(n) => Err(format!("{n}: loop count out of range")),
            Err(_) => Err(format!("{arg}: numeric argument required")),
        },
    }
}

pub fn break_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let n = match loop_count(args) {
        Ok(n) => n,
        Err(msg) => {
            eprintln!("marsh: break: {msg}");
            return Ok(1);
        }
    };
    if shell.loop_depth == 0 {
        eprintln!("marsh: break: only meaningful in a `for', `while', or `until' loop");
        return Ok(0);
    }
    Err(ExecError::Break(n.min(shell.loop_depth)))
}

pub fn continue_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let n = match loop_count(args) {
        Ok(n) => n,
        Err(msg) => {
            eprintln!("marsh: continue: {msg}");
            return Ok(1);
        }
    };
    if shell.loop_depth == 0 {
        eprintln!("marsh: continue: only meaningful in a `for', `while', or `until' loop");
        return Ok(0);
    }
    Err(ExecError::Continue(n.min(shell.loop_depth)))
}

pub fn return_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let status = match args.first() {
        None => shell.last_status,
        Some(arg) => match arg.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => {
                eprintln!("marsh: return: {arg}: numeric argument required");
                return Ok(2);
            }
        },
    };
    if shell.func_depth > 0 || shell.source_depth > 0 {
        Err(ExecError::Return(status))
    } else {
        // At top level return behaves like exit.
        Err(ExecError::Exit(status))
    }
}

pub fn exit_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let status = match args.first() {
        None => shell.last_status,
        Some(arg) => match arg.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => {
                eprintln!("marsh: exit: {arg}: numeric argument required");
                return Err(ExecError::Exit(2));
            }
        },
    };
    Err(ExecError::Exit(status))
}

pub fn shift_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let n = match args.first() {
        None => 1usize,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("marsh: shift: {arg}: numeric argument required");
                return Ok(1);
            }
        },
    };
    if n > shell.positional.len() {
        eprintln!("marsh: shift: shift count out of range");
        return Ok(1);
    }
    shell.positional.drain(..n);
    Ok(0)
}
