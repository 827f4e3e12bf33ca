//! Directory built-ins: cd, pwd

use crate::exec::ExecError;
use crate::shell::Shell;

pub fn cd_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut physical = false;
    let mut operands = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-P" => physical = true,
            "-L" => physical = false,
            "--" => {}
            _ => operands.push(arg.clone()),
        }
    }

    let mut print_target = false;
    let target = match operands.first().map(String::as_str) {
        None => match shell.vars.get_scalar("HOME") {
            Some(home) => home.to_string(),
            None => {
                eprintln!("marsh: cd: HOME not set");
                return Ok(1);
            }
        },
        Some("-") => match shell.vars.get_scalar("OLDPWD") {
            Some(oldpwd) => {
                print_target = true;
                oldpwd.to_string()
            }
            None => {
                eprintln!("marsh: cd: OLDPWD not set");
                return Ok(1);
            }
        },
        Some(dir) => dir.to_string(),
    };

    let previous = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Err(e) = nix::unistd::chdir(target.as_str()) {
        eprintln!("marsh: cd: {target}: {e}");
        return Ok(1);
    }

    let new_pwd = if physical {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(target)
    } else {
        logical_path(&previous, &target)
    };

    let _ = shell.vars.set_scalar("OLDPWD", &previous, false);
    shell.vars.set_exported("OLDPWD", true);
    let _ = shell.vars.set_scalar("PWD", &new_pwd, false);
    shell.vars.set_exported("PWD", true);

    if print_target {
        println!("{new_pwd}");
    }
    Ok(0)
}

pub fn pwd_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let physical = args.iter().any(|a| a == "-P");
    let logical = shell.vars.get_scalar("PWD").map(str::to_string);
    let path = if physical {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        logical.unwrap_or_else(|| {
            std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    };
    println!("{path}");
    Ok(0)
}

/// Resolve `.` and `..` textually against the previous logical PWD.
fn logical_path(previous: &str, target: &str) -> String {
    let base = if target.starts_with('/') {
        String::new()
    } else {
        previous.to_string()
    };
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for comp in target.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::logical_path;

    #[test]
    fn dot_and_dotdot_resolve() {
        assert_eq!(logical_path("/a/b", "c"), "/a/b/c");
        assert_eq!(logical_path("/a/b", ".."), "/a");
        assert_eq!(logical_path("/a/b", "../c/./d"), "/a/c/d");
        assert_eq!(logical_path("/a/b", "/x/y"), "/x/y");
    }
}
