//! set, shopt

use crate::exec::ExecError;
use crate::shell::{Shell, ShellOptions};

/// Single-letter option flags understood by `set` (and the command line).
pub fn apply_flag(opts: &mut ShellOptions, flag: char, on: bool) -> bool {
    match flag {
        'e' => opts.errexit = on,
        'u' => opts.nounset = on,
        'x' => opts.xtrace = on,
        'f' => opts.noglob = on,
        'v' => opts.verbose = on,
        'n' => opts.noexec = on,
        'm' => opts.monitor = on,
        _ => return false,
    }
    true
}

pub fn set_builtin(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    if args.is_empty() {
        for (name, var) in shell.vars.visible() {
            if let Some(value) = var.value.as_ref().and_then(|v| v.as_scalar()) {
                println!("{name}='{}'", value.replace('\'', "'\\''"));
            }
        }
        return Ok(0);
    }

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--" => {
                // Everything after replaces the positional parameters.
                shell.positional = args[i + 1..].to_vec();
                return Ok(0);
            }
            "-o" | "+o" => {
                let on = arg.starts_with('-');
                match args.get(i + 1) {
                    None => {
                        list_options(shell, arg == "-o");
                        i += 1;
                    }
                    Some(name) => {
                        match shell.opts.by_name(name) {
                            Some(slot) => *slot = on,
                            None => {
                                eprintln!("marsh: set: {name}: invalid option name");
                                return Ok(2);
                            }
                        }
                        i += 2;
                    }
                }
            }
            _ if arg.starts_with('-') || arg.starts_with('+') => {
                let on = arg.starts_with('-');
                for flag in arg[1..].chars() {
                    if !apply_flag(&mut shell.opts, flag, on) {
                        eprintln!("marsh: set: -{flag}: invalid option");
                        return Ok(2);
                    }
                }
                i += 1;
            }
            _ => {
                // First non-option word: the rest become the positional
                // parameters.
                shell.positional = args[i..].to_vec();
                return Ok(0);
            }
        }
    }
    Ok(0)
}

fn list_options(shell: &Shell, settable_format: bool) {
    let mut opts = shell.opts.clone();
    for name in ShellOptions::OPTION_NAMES {
        let on = opts.by_name(name).map(|b| *b).unwrap_or(false);
        if settable_format {
            println!("{name}\t{}", if on { "on" } else { "off" });
        } else {
            println!("set {}o {name}", if on { "-" } else { "+" });
        }
    }
}

const SHOPT_NAMES: &[&str] = &["dotglob", "failglob", "nullglob"];

fn shopt_option<'a>(opts: &'a mut ShellOptions, name: &str) -> Option<&'a mut bool> {
    match name {
        "nullglob" => Some(&mut opts.nullglob),
        "failglob" => Some(&mut opts.failglob),
        "dotglob" => Some(&mut opts.dotglob),
        _ => None,
    }
}

pub fn shopt_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut set_on = false;
    let mut set_off = false;
    let mut quiet = false;
    let mut names = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-s" => set_on = true,
            "-u" => set_off = true,
            "-q" => quiet = true,
            _ => names.push(arg.as_str()),
        }
    }

    if names.is_empty() {
        for name in SHOPT_NAMES {
            let on = *shopt_option(&mut shell.opts, name).unwrap();
            println!("{name}\t{}", if on { "on" } else { "off" });
        }
        return Ok(0);
    }

    let mut status = 0;
    for name in names {
        match shopt_option(&mut shell.opts, name) {
            Some(slot) => {
                if set_on {
                    *slot = true;
                } else if set_off {
                    *slot = false;
                } else {
                    let on = *slot;
                    if !quiet {
                        println!("{name}\t{}", if on { "on" } else { "off" });
                    }
                    if !on {
                        status = 1;
                    }
                }
            }
            None => {
                eprintln!("marsh: shopt: {name}: invalid shell option name");
                status = 1;
            }
        }
    }
    Ok(status)
}
