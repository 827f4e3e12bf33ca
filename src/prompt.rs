//! Prompt rendering
//!
//! PS1/PS2 escape sequences: `\u \h \w \W \d \t \T \A \\ \$ \! \# \[ \]`
//! plus `\n`. `\[` and `\]` bracket non-printing sequences for width
//! accounting; with no line editor they contribute nothing.

use chrono::{Datelike, Local, Timelike};

use crate::shell::Shell;

pub fn render_prompt(shell: &Shell, template: &str) -> String {
    let now = Local::now();
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        match chars[i] {
            'u' => out.push_str(&username()),
            'h' => {
                let host = hostname();
                out.push_str(host.split('.').next().unwrap_or(&host));
            }
            'H' => out.push_str(&hostname()),
            'w' => out.push_str(&working_dir(shell, false)),
            'W' => out.push_str(&working_dir(shell, true)),
            'd' => {
                let days = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
                let months = [
                    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct",
                    "Nov", "Dec",
                ];
                out.push_str(&format!(
                    "{} {} {:02}",
                    days[now.weekday().num_days_from_sunday() as usize],
                    months[(now.month() - 1) as usize],
                    now.day()
                ));
            }
            't' => out.push_str(&format!(
                "{:02}:{:02}:{:02}",
                now.hour(),
                now.minute(),
                now.second()
            )),
            'T' => {
                let mut h = now.hour() % 12;
                if h == 0 {
                    h = 12;
                }
                out.push_str(&format!("{:02}:{:02}:{:02}", h, now.minute(), now.second()));
            }
            'A' => out.push_str(&format!("{:02}:{:02}", now.hour(), now.minute())),
            '$' => out.push(if nix::unistd::geteuid().is_root() {
                '#'
            } else {
                '$'
            }),
            '!' => out.push_str(&(shell.history.len() + 1).to_string()),
            '#' => out.push_str(&(shell.history.len() + 1).to_string()),
            'n' => out.push('\n'),
            '\\' => out.push('\\'),
            '[' | ']' => {}
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        i += 1;
    }
    out
}

fn username() -> String {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| "?".to_string())
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// The working directory, `~`-abbreviated; basename only for `\W`.
fn working_dir(shell: &Shell, basename: bool) -> String {
    let pwd = shell
        .vars
        .get_scalar("PWD")
        .map(str::to_string)
        .unwrap_or_else(|| {
            std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
    let abbreviated = match shell.vars.get_scalar("HOME") {
        Some(home) if !home.is_empty() && pwd.starts_with(home) => {
            format!("~{}", &pwd[home.len()..])
        }
        _ => pwd,
    };
    if basename {
        match abbreviated.rsplit('/').next() {
            Some("") | None => abbreviated,
            Some(base) => base.to_string(),
        }
    } else {
        abbreviated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOptions;

    #[test]
    fn literal_text_passes_through() {
        let shell = Shell::new(ShellOptions::default());
        assert_eq!(render_prompt(&shell, "plain> "), "plain> ");
        assert_eq!(render_prompt(&shell, r"a\\b"), r"a\b");
    }

    #[test]
    fn tilde_abbreviation() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set_scalar("HOME", "/home/u", false).unwrap();
        shell.vars.set_scalar("PWD", "/home/u/src", false).unwrap();
        assert_eq!(render_prompt(&shell, r"\w"), "~/src");
        assert_eq!(render_prompt(&shell, r"\W"), "src");
    }

    #[test]
    fn width_brackets_vanish() {
        let shell = Shell::new(ShellOptions::default());
        assert_eq!(render_prompt(&shell, r"\[esc\]x"), "escx");
    }

    #[test]
    fn unknown_escape_is_literal() {
        let shell = Shell::new(ShellOptions::default());
        assert_eq!(render_prompt(&shell, r"\q"), r"\q");
    }
}
