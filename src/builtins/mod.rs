//! Built-in commands
//!
//! Each built-in is a small function behind a uniform interface. The
//! registry keeps two tables: the POSIX special set (`:`, `break`,
//! `continue`, `eval`, `exec`, `exit`, `export`, `readonly`, `return`,
//! `set`, `shift`, `times`, `trap`, `unset`), whose assignment prefixes
//! persist, and the regular set, which includes `.`/`source`.

pub mod cd;
pub mod echo;
pub mod eval;
pub mod export;
pub mod flow;
pub mod jobs;
pub mod read;
pub mod set_cmd;
pub mod test;
pub mod trap_cmd;
pub mod type_cmd;

use crate::exec::ExecError;
use crate::shell::Shell;

/// The uniform built-in interface: argv (without the command name) in,
/// exit status or control flow out.
pub type Builtin = fn(&mut Shell, &[String]) -> Result<i32, ExecError>;

fn colon(_shell: &mut Shell, _args: &[String]) -> Result<i32, ExecError> {
    Ok(0)
}

fn true_cmd(_shell: &mut Shell, _args: &[String]) -> Result<i32, ExecError> {
    Ok(0)
}

fn false_cmd(_shell: &mut Shell, _args: &[String]) -> Result<i32, ExecError> {
    Ok(1)
}

/// The POSIX special built-ins.
pub fn find_special(name: &str) -> Option<Builtin> {
    Some(match name {
        ":" => colon,
        "break" => flow::break_cmd,
        "continue" => flow::continue_cmd,
        "eval" => eval::eval_cmd,
        "exec" => eval::exec_cmd,
        "exit" => flow::exit_cmd,
        "export" => export::export_cmd,
        "readonly" => export::readonly_cmd,
        "return" => flow::return_cmd,
        "set" => set_cmd::set_builtin,
        "shift" => flow::shift_cmd,
        "times" => trap_cmd::times_cmd,
        "trap" => trap_cmd::trap_cmd,
        "unset" => export::unset_cmd,
        _ => return None,
    })
}

/// The regular built-ins.
pub fn find(name: &str) -> Option<Builtin> {
    Some(match name {
        "." | "source" => eval::source,
        "cd" => cd::cd_cmd,
        "pwd" => cd::pwd_cmd,
        "echo" => echo::echo_cmd,
        "test" | "[" => test::test_cmd,
        "read" => read::read_cmd,
        "type" => type_cmd::type_cmd,
        "alias" => type_cmd::alias_cmd,
        "unalias" => type_cmd::unalias_cmd,
        "local" => export::local_cmd,
        "shopt" => set_cmd::shopt_cmd,
        "jobs" => jobs::jobs_cmd,
        "fg" => jobs::fg_cmd,
        "bg" => jobs::bg_cmd,
        "wait" => jobs::wait_cmd,
        "true" => true_cmd,
        "false" => false_cmd,
        _ => return None,
    })
}

/// Is the name a built-in of either kind?
pub fn is_builtin(name: &str) -> bool {
    find_special(name).is_some() || find(name).is_some()
}
