//! Variable built-ins: export, readonly, unset, local

use crate::exec::ExecError;
use crate::shell::Shell;

/// Split `name=value` arguments; a bare name has no value.
fn split_assignment(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (arg, None),
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

pub fn export_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut unexport = false;
    let mut operands = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-n" => unexport = true,
            "-p" => {}
            "--" => {}
            _ => operands.push(arg),
        }
    }

    if operands.is_empty() {
        for (name, var) in shell.vars.visible() {
            if var.attributes.exported {
                match var.value.as_ref().and_then(|v| v.as_scalar()) {
                    Some(value) => println!("export {name}={}", quote_value(value)),
                    None => println!("export {name}"),
                }
            }
        }
        return Ok(0);
    }

    let mut status = 0;
    for arg in operands {
        let (name, value) = split_assignment(arg);
        if !is_valid_name(name) {
            eprintln!("marsh: export: `{arg}': not a valid identifier");
            status = 1;
            continue;
        }
        if let Some(value) = value {
            if let Err(e) = shell.vars.set_scalar(name, value, false) {
                eprintln!("marsh: export: {e}");
                status = 1;
                continue;
            }
        }
        shell.vars.set_exported(name, !unexport);
    }
    Ok(status)
}

pub fn readonly_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let operands: Vec<&String> = args
        .iter()
        .filter(|a| !matches!(a.as_str(), "-p" | "--"))
        .collect();

    if operands.is_empty() {
        for (name, var) in shell.vars.visible() {
            if var.attributes.readonly {
                match var.value.as_ref().and_then(|v| v.as_scalar()) {
                    Some(value) => println!("readonly {name}={}", quote_value(value)),
                    None => println!("readonly {name}"),
                }
            }
        }
        return Ok(0);
    }

    let mut status = 0;
    for arg in operands {
        let (name, value) = split_assignment(arg);
        if !is_valid_name(name) {
            eprintln!("marsh: readonly: `{arg}': not a valid identifier");
            status = 1;
            continue;
        }
        if let Some(value) = value {
            if let Err(e) = shell.vars.set_scalar(name, value, false) {
                eprintln!("marsh: readonly: {e}");
                status = 1;
                continue;
            }
        }
        shell.vars.set_readonly(name);
    }
    Ok(status)
}

pub fn unset_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut functions = false;
    let mut variables = false;
    let mut operands = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-f" => functions = true,
            "-v" => variables = true,
            "--" => {}
            _ => operands.push(arg),
        }
    }

    let mut status = 0;
    for name in operands {
        if functions {
            shell.functions.remove(name.as_str());
            continue;
        }
        let had_variable = shell.vars.get(name).is_some();
        match shell.vars.unset(name) {
            Ok(()) => {
                // Without -v, a name that is not a variable may still be
                // a function.
                if !variables && !had_variable {
                    shell.functions.remove(name.as_str());
                }
            }
            Err(e) => {
                eprintln!("marsh: unset: {e}");
                status = 1;
            }
        }
    }
    Ok(status)
}

pub fn local_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    if shell.func_depth == 0 {
        eprintln!("marsh: local: can only be used in a function");
        return Ok(1);
    }
    let mut status = 0;
    for arg in args {
        let (name, value) = split_assignment(arg);
        if !is_valid_name(name) {
            eprintln!("marsh: local: `{arg}': not a valid identifier");
            status = 1;
            continue;
        }
        shell.vars.declare_local(name);
        if let Some(value) = value {
            if let Err(e) = shell.vars.set_scalar(name, value, false) {
                eprintln!("marsh: local: {e}");
                status = 1;
            }
        }
    }
    Ok(status)
}

fn quote_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
