use std::io::{BufRead, IsTerminal, Write};

use clap::Parser;

use marsh::exec::{self, ExecError};
use marsh::process::signals;
use marsh::prompt::render_prompt;
use marsh::shell::{Shell, ShellOptions};

#[derive(Parser)]
#[command(name = "marsh")]
#[command(about = "A POSIX-compatible shell with selected bash extensions")]
#[command(version)]
struct Cli {
    /// Run this string as the script
    #[arg(short = 'c', value_name = "STRING")]
    command: Option<String>,

    /// Read commands from standard input
    #[arg(short = 's')]
    stdin: bool,

    /// Force interactive mode
    #[arg(short = 'i')]
    interactive: bool,

    /// Act as a login shell
    #[arg(short = 'l')]
    login: bool,

    /// Trace each command after expansion
    #[arg(short = 'x')]
    xtrace: bool,

    /// Exit immediately when a command fails
    #[arg(short = 'e')]
    errexit: bool,

    /// Treat unset variables as an error
    #[arg(short = 'u')]
    nounset: bool,

    /// Skip the interactive startup file
    #[arg(long = "norc")]
    norc: bool,

    /// Strict POSIX mode
    #[arg(long = "posix")]
    posix: bool,

    /// Script file and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let script_file = if cli.command.is_none() && !cli.stdin {
        cli.script_args.first().cloned()
    } else {
        None
    };

    let interactive = cli.interactive
        || (cli.command.is_none() && script_file.is_none() && std::io::stdin().is_terminal());

    let mut opts = ShellOptions {
        errexit: cli.errexit,
        nounset: cli.nounset,
        xtrace: cli.xtrace,
        posix: cli.posix,
        interactive,
        login: cli.login,
        ..ShellOptions::default()
    };
    opts.monitor = interactive;

    let mut shell = Shell::new(opts);

    let init = if interactive {
        signals::init_interactive()
    } else {
        signals::init_noninteractive()
    };
    if let Err(e) = init {
        eprintln!("marsh: cannot set signal dispositions: {e}");
    }

    // Startup files.
    if cli.login {
        let path = home_path(&shell, ".profile");
        source_if_exists(&mut shell, &path);
    }
    if interactive && !cli.norc {
        let path = home_path(&shell, ".marshrc");
        source_if_exists(&mut shell, &path);
    }

    let status = if let Some(text) = cli.command {
        shell.arg0 = cli
            .script_args
            .first()
            .cloned()
            .unwrap_or_else(|| "marsh".to_string());
        if cli.script_args.len() > 1 {
            shell.positional = cli.script_args[1..].to_vec();
        }
        run_program(&mut shell, &text)
    } else if let Some(path) = script_file {
        shell.arg0 = path.clone();
        shell.positional = cli.script_args[1..].to_vec();
        match std::fs::read_to_string(&path) {
            Ok(text) => run_program(&mut shell, &text),
            Err(e) => {
                eprintln!("marsh: {path}: {e}");
                127
            }
        }
    } else if interactive {
        repl(&mut shell)
    } else {
        // -s or piped stdin.
        if !cli.script_args.is_empty() {
            shell.positional = cli.script_args.clone();
        }
        let mut text = String::new();
        match std::io::Read::read_to_string(&mut std::io::stdin(), &mut text) {
            Ok(_) => run_program(&mut shell, &text),
            Err(e) => {
                eprintln!("marsh: cannot read standard input: {e}");
                1
            }
        }
    };

    std::process::exit(shutdown(&mut shell, status));
}

fn home_path(shell: &Shell, file: &str) -> String {
    match shell.vars.get_scalar("HOME") {
        Some(home) => format!("{home}/{file}"),
        None => file.to_string(),
    }
}

fn source_if_exists(shell: &mut Shell, path: &str) {
    if !std::path::Path::new(path).exists() {
        return;
    }
    if let Ok(text) = std::fs::read_to_string(path) {
        let _ = run_program_inner(shell, &text);
    }
}

/// Run a complete program text; errors are reported here and mapped to
/// the exit-code conventions.
fn run_program(shell: &mut Shell, text: &str) -> i32 {
    match run_program_inner(shell, text) {
        Ok(status) => status,
        Err(status) => status,
    }
}

/// `Err` carries a status that must end the shell now.
fn run_program_inner(shell: &mut Shell, text: &str) -> Result<i32, i32> {
    let parsed = if shell.opts.posix {
        marsh::parser::parse_posix(text)
    } else {
        marsh::parser::parse(text)
    };
    let script = match parsed {
        Ok(script) => script,
        Err(e) => {
            eprintln!("marsh: {e}");
            return Err(2);
        }
    };

    let mut status = shell.last_status;
    for stmt in &script.statements {
        exec::notice_jobs(shell);
        if shell.opts.verbose && !stmt.source_text.is_empty() {
            eprintln!("{}", stmt.source_text);
        }
        match exec::exec_statement(shell, stmt) {
            Ok(s) => status = s,
            Err(flow) => return Err(handle_flow(shell, flow)),
        }
        shell.last_status = status;
    }
    Ok(status)
}

/// Map an escaped control-flow or error value to a final exit status.
fn handle_flow(shell: &mut Shell, flow: ExecError) -> i32 {
    match flow {
        ExecError::Exit(status) | ExecError::Return(status) => status,
        ExecError::Break(_) | ExecError::Continue(_) => shell.last_status,
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

/// The interactive read-eval loop: PS1, PS2 continuation on incomplete
/// input, job notifications at the prompt.
fn repl(shell: &mut Shell) -> i32 {
    let stdin = std::io::stdin();
    let mut buffer = String::new();
    let mut status = 0;

    loop {
        exec::notice_jobs(shell);
        let _ = exec::run_pending_traps(shell);
        shell.traps.take_interrupt();

        let template = if buffer.is_empty() {
            shell.vars.get_scalar("PS1").unwrap_or("$ ").to_string()
        } else {
            shell.vars.get_scalar("PS2").unwrap_or("> ").to_string()
        };
        eprint!("{}", render_prompt(shell, &template));
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                if !buffer.is_empty() {
                    eprintln!("marsh: unexpected end of input");
                    buffer.clear();
                    continue;
                }
                break;
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                eprintln!();
                buffer.clear();
                continue;
            }
            Err(_) => break,
        }
        buffer.push_str(&line);

        let script = match marsh::parser::parse(&buffer) {
            Ok(script) => script,
            Err(e) if e.incomplete => continue, // PS2 and more input
            Err(e) => {
                eprintln!("marsh: {e}");
                buffer.clear();
                status = 2;
                shell.last_status = 2;
                continue;
            }
        };
        shell.history.add(&buffer);
        buffer.clear();

        for stmt in &script.statements {
            match exec::exec_statement(shell, stmt) {
                Ok(s) => status = s,
                Err(ExecError::Exit(s)) | Err(ExecError::Return(s)) => {
                    return s;
                }
                Err(flow) => {
                    // Interactive mode abandons the command and returns
                    // to the prompt.
                    status = handle_flow(shell, flow);
                }
            }
            shell.last_status = status;
        }
    }
    status
}

/// Exit trap, history file, final status.
fn shutdown(shell: &mut Shell, status: i32) -> i32 {
    shell.last_status = status;
    exec::run_exit_trap(shell);
    if shell.opts.interactive && !shell.history.is_empty() {
        let path = shell
            .vars
            .get_scalar("HISTFILE")
            .map(str::to_string)
            .unwrap_or_else(|| home_path(shell, ".marsh_history"));
        if let Err(e) = shell.history.append_to_file(&path) {
            eprintln!("marsh: cannot write history file: {e}");
        }
    }
    status & 0xff
}
