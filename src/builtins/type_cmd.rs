//! type, alias, unalias

use crate::builtins;
use crate::exec::strategy::{find_command, Found};
use crate::exec::ExecError;
use crate::lexer::keywords::is_reserved_word;
use crate::shell::Shell;

pub fn type_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut status = 0;
    for name in args {
        if let Some(body) = shell.aliases.get(name) {
            println!("{name} is aliased to `{body}'");
        } else if is_reserved_word(name) {
            println!("{name} is a shell keyword");
        } else if shell.functions.contains_key(name) {
            println!("{name} is a function");
        } else if builtins::is_builtin(name) {
            println!("{name} is a shell builtin");
        } else {
            match find_command(shell, name) {
                Found::Path(path) => println!("{name} is {path}"),
                _ => {
                    eprintln!("marsh: type: {name}: not found");
                    status = 1;
                }
            }
        }
    }
    Ok(status)
}

pub fn alias_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    if args.is_empty() {
        let mut names: Vec<&String> = shell.aliases.keys().collect();
        names.sort();
        for name in names {
            println!("alias {name}='{}'", shell.aliases[name].replace('\'', "'\\''"));
        }
        return Ok(0);
    }

    let mut status = 0;
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) => {
                shell.aliases.insert(name.to_string(), value.to_string());
            }
            None => match shell.aliases.get(arg) {
                Some(value) => {
                    println!("alias {arg}='{}'", value.replace('\'', "'\\''"))
                }
                None => {
                    eprintln!("marsh: alias: {arg}: not found");
                    status = 1;
                }
            },
        }
    }
    Ok(status)
}

pub fn unalias_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    if args.iter().any(|a| a == "-a") {
        shell.aliases.clear();
        return Ok(0);
    }
    let mut status = 0;
    for name in args {
        if shell.aliases.remove(name).is_none() {
            eprintln!("marsh: unalias: {name}: not found");
            status = 1;
        }
    }
    Ok(status)
}
