//! trap, times

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::exec::ExecError;
use crate::process::signals::TrapAction;
use crate::shell::Shell;

lazy_static! {
    /// Signal names accepted by `trap`, with and without the SIG prefix.
    static ref SIGNAL_NAMES: HashMap<&'static str, i32> = {
        let mut m = HashMap::new();
        m.insert("EXIT", 0);
        m.insert("HUP", libc::SIGHUP);
        m.insert("INT", libc::SIGINT);
        m.insert("QUIT", libc::SIGQUIT);
        m.insert("ILL", libc::SIGILL);
        m.insert("ABRT", libc::SIGABRT);
        m.insert("FPE", libc::SIGFPE);
        m.insert("KILL", libc::SIGKILL);
        m.insert("SEGV", libc::SIGSEGV);
        m.insert("PIPE", libc::SIGPIPE);
        m.insert("ALRM", libc::SIGALRM);
        m.insert("TERM", libc::SIGTERM);
        m.insert("USR1", libc::SIGUSR1);
        m.insert("USR2", libc::SIGUSR2);
        m.insert("CHLD", libc::SIGCHLD);
        m.insert("CONT", libc::SIGCONT);
        m.insert("STOP", libc::SIGSTOP);
        m.insert("TSTP", libc::SIGTSTP);
        m.insert("TTIN", libc::SIGTTIN);
        m.insert("TTOU", libc::SIGTTOU);
        m
    };
}

fn parse_signal(spec: &str) -> Option<i32> {
    if let Ok(n) = spec.parse::<i32>() {
        return (0..=64).contains(&n).then_some(n);
    }
    let upper = spec.to_uppercase();
    let name = upper.strip_prefix("SIG").unwrap_or(&upper);
    SIGNAL_NAMES.get(name).copied()
}

fn signal_name(sig: i32) -> String {
    SIGNAL_NAMES
        .iter()
        .find(|(_, &n)| n == sig)
        .map(|(name, _)| {
            if *name == "EXIT" {
                name.to_string()
            } else {
                format!("SIG{name}")
            }
        })
        .unwrap_or_else(|| sig.to_string())
}

pub fn trap_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    if args.is_empty() || args[0] == "-p" {
        for (sig, action) in shell.traps.listing() {
            println!("trap -- '{}' {}", action.replace('\'', "'\\''"), signal_name(sig));
        }
        return Ok(0);
    }

    let (action_arg, signals) = {
        let first = args[0].as_str();
        // `trap N...` with a leading number resets those signals.
        if args.len() > 1 || first.parse::<i32>().is_err() {
            (first, &args[1..])
        } else {
            ("-", args)
        }
    };

    let action = match action_arg {
        "-" => TrapAction::Default,
        "" => TrapAction::Ignore,
        cmd => TrapAction::Command(cmd.to_string()),
    };

    if signals.is_empty() {
        eprintln!("marsh: trap: signal specification required");
        return Ok(2);
    }

    let mut status = 0;
    for spec in signals {
        match parse_signal(spec) {
            Some(sig) => {
                if let Err(e) = shell.traps.set_trap(sig, action.clone()) {
                    eprintln!("marsh: trap: {spec}: {e}");
                    status = 1;
                }
            }
            None => {
                eprintln!("marsh: trap: {spec}: invalid signal specification");
                status = 1;
            }
        }
    }
    Ok(status)
}

/// Accumulated user and system times for the shell and its children.
pub fn times_cmd(_shell: &mut Shell, _args: &[String]) -> Result<i32, ExecError> {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) } as f64;
    let mut tms = libc::tms {
        tms_utime: 0,
        tms_stime: 0,
        tms_cutime: 0,
        tms_cstime: 0,
    };
    if unsafe { libc::times(&mut tms) } == -1 || ticks <= 0.0 {
        eprintln!("marsh: times: cannot read process times");
        return Ok(1);
    }
    let fmt = |clock: libc::clock_t| {
        let secs = clock as f64 / ticks;
        format!("{}m{:.3}s", (secs / 60.0) as u64, secs % 60.0)
    };
    println!("{} {}", fmt(tms.tms_utime), fmt(tms.tms_stime));
    println!("{} {}", fmt(tms.tms_cutime), fmt(tms.tms_cstime));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::parse_signal;

    #[test]
    fn signal_specs() {
        assert_eq!(parse_signal("EXIT"), Some(0));
        assert_eq!(parse_signal("INT"), Some(libc::SIGINT));
        assert_eq!(parse_signal("SIGTERM"), Some(libc::SIGTERM));
        assert_eq!(parse_signal("term"), Some(libc::SIGTERM));
        assert_eq!(parse_signal("15"), Some(15));
        assert_eq!(parse_signal("NOSUCH"), None);
    }
}
