//! Tilde expansion
//!
//! Phase two: a leading unquoted `~` expands to `$HOME`, `~name` to that
//! user's home directory, `~+` and `~-` to `$PWD` and `$OLDPWD`. In
//! assignment values a tilde is also recognized after `:` (and the
//! leading `=` was already consumed by the parser). The tilde prefix
//! must be entirely literal: `~$user` does not expand. Expanded text is
//! marker-protected so a home directory containing metacharacters is
//! not re-scanned by later phases.

use crate::ast::types::{WordNode, WordPart};
use crate::expand::pattern::protect;
use crate::shell::Shell;

/// Apply tilde expansion to a word. `assignment` enables the
/// colon-separated form used in values like `PATH=~/bin:~/opt`.
pub fn expand_tilde(shell: &Shell, word: &WordNode, assignment: bool) -> WordNode {
    let mut parts = word.parts.clone();
    if let Some(WordPart::Literal(text)) = parts.first() {
        if text.starts_with('~') {
            let (prefix, rest) = split_prefix(text);
            // `~$u` — the prefix would continue into the next part, so it
            // only expands when it ends inside this literal.
            let ends_here = !rest.is_empty() || parts.len() == 1;
            if ends_here {
                if let Some(dir) = resolve(shell, prefix) {
                    let expanded = format!("{}{}", protect(&dir), rest);
                    parts[0] = WordPart::Literal(expanded);
                }
            }
        }
    }
    if assignment {
        for part in &mut parts {
            if let WordPart::Literal(text) = part {
                *text = expand_after_colons(shell, text);
            }
        }
    }
    WordNode { parts }
}

/// Split `~prefix` from the rest of the literal at the first `/`.
fn split_prefix(text: &str) -> (&str, &str) {
    match text.find('/') {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    }
}

/// Resolve a tilde prefix (including the `~`) to a directory.
fn resolve(shell: &Shell, prefix: &str) -> Option<String> {
    match prefix {
        "~" => shell
            .vars
            .get_scalar("HOME")
            .map(str::to_string)
            .or_else(home_of_current_user),
        "~+" => shell.vars.get_scalar("PWD").map(str::to_string),
        "~-" => shell.vars.get_scalar("OLDPWD").map(str::to_string),
        _ => home_of(&prefix[1..]),
    }
}

fn home_of(name: &str) -> Option<String> {
    let user = nix::unistd::User::from_name(name).ok()??;
    Some(user.dir.to_string_lossy().into_owned())
}

fn home_of_current_user() -> Option<String> {
    let user = nix::unistd::User::from_uid(nix::unistd::getuid()).ok()??;
    Some(user.dir.to_string_lossy().into_owned())
}

/// In assignment values, expand `~` after each unquoted `:`.
fn expand_after_colons(shell: &Shell, text: &str) -> String {
    if !text.contains(":~") {
        return text.to_string();
    }
    let mut out = String::new();
    for (i, piece) in text.split(':').enumerate() {
        if i > 0 {
            out.push(':');
        }
        if piece.starts_with('~') {
            let (prefix, rest) = split_prefix(piece);
            match resolve(shell, prefix) {
                Some(dir) => {
                    out.push_str(&protect(&dir));
                    out.push_str(rest);
                }
                None => out.push_str(piece),
            }
        } else {
            out.push_str(piece);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOptions;

    fn shell_with_home(home: &str) -> Shell {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set_scalar("HOME", home, false).unwrap();
        shell
    }

    fn flat(word: &WordNode) -> String {
        word.flatten_literal().replace('\u{0}', "")
    }

    #[test]
    fn bare_tilde_uses_home() {
        let shell = shell_with_home("/home/me");
        let w = expand_tilde(&shell, &WordNode::literal("~"), false);
        assert_eq!(flat(&w), "/home/me");
        let w = expand_tilde(&shell, &WordNode::literal("~/src"), false);
        assert_eq!(flat(&w), "/home/me/src");
    }

    #[test]
    fn tilde_plus_and_minus() {
        let mut shell = shell_with_home("/home/me");
        shell.vars.set_scalar("PWD", "/tmp/here", false).unwrap();
        shell.vars.set_scalar("OLDPWD", "/tmp/there", false).unwrap();
        let w = expand_tilde(&shell, &WordNode::literal("~+"), false);
        assert_eq!(flat(&w), "/tmp/here");
        let w = expand_tilde(&shell, &WordNode::literal("~-"), false);
        assert_eq!(flat(&w), "/tmp/there");
    }

    #[test]
    fn unknown_user_left_alone() {
        let shell = shell_with_home("/home/me");
        let w = expand_tilde(
            &shell,
            &WordNode::literal("~nosuchuserhopefully42"),
            false,
        );
        assert_eq!(flat(&w), "~nosuchuserhopefully42");
    }

    #[test]
    fn assignment_colon_form() {
        let shell = shell_with_home("/home/me");
        let w = expand_tilde(&shell, &WordNode::literal("/bin:~/x"), true);
        assert_eq!(flat(&w), "/bin:/home/me/x");
    }

    #[test]
    fn quoted_tilde_is_not_expanded() {
        let shell = shell_with_home("/home/me");
        let word = WordNode {
            parts: vec![WordPart::SingleQuoted("~".into())],
        };
        let w = expand_tilde(&shell, &word, false);
        assert_eq!(w.parts, vec![WordPart::SingleQuoted("~".into())]);
    }
}
