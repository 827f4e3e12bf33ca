//! test / [
//!
//! The classic expression evaluator: file tests, string tests, numeric
//! comparisons, `!`, `-a`/`-o`, and parentheses, over the argument list.

use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::PermissionsExt;

use crate::exec::ExecError;
use crate::shell::Shell;

pub fn test_cmd(_shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut args: Vec<&str> = args.iter().map(String::as_str).collect();

    // `[` requires a closing `]`.
    if let Some(&"]") = args.last() {
        args.pop();
    }

    if args.is_empty() {
        return Ok(1);
    }

    let mut p = TestParser { args, pos: 0 };
    match p.or_expr() {
        Ok(value) => {
            if p.pos != p.args.len() {
                eprintln!("marsh: test: too many arguments");
                return Ok(2);
            }
            Ok(i32::from(!value))
        }
        Err(msg) => {
            eprintln!("marsh: test: {msg}");
            Ok(2)
        }
    }
}

struct TestParser<'a> {
    args: Vec<&'a str>,
    pos: usize,
}

impl<'a> TestParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.args.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<&'a str> {
        let arg = self.peek();
        if arg.is_some() {
            self.pos += 1;
        }
        arg
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut value = self.and_expr()?;
        while self.peek() == Some("-o") {
            self.bump();
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut value = self.not_expr()?;
        while self.peek() == Some("-a") {
            self.bump();
            let rhs = self.not_expr()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn not_expr(&mut self) -> Result<bool, String> {
        if self.peek() == Some("!") {
            self.bump();
            return Ok(!self.not_expr()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<bool, String> {
        if self.peek() == Some("(") {
            self.bump();
            let value = self.or_expr()?;
            if self.bump() != Some(")") {
                return Err("missing `)'".to_string());
            }
            return Ok(value);
        }

        let first = self.bump().ok_or("argument expected")?;

        // Unary operator?
        if first.len() == 2 && first.starts_with('-') && self.peek().is_some() {
            if let Some(result) = self.try_unary(first) {
                return result;
            }
        }

        // Binary operator?
        if let Some(op) = self.peek() {
            if is_binary_op(op) {
                self.bump();
                let rhs = self.bump().ok_or("argument expected")?;
                return binary(first, op, rhs);
            }
        }

        // A lone word tests for non-emptiness.
        Ok(!first.is_empty())
    }

    fn try_unary(&mut self, op: &str) -> Option<Result<bool, String>> {
        let operand = self.peek()?;
        let result = match op {
            "-n" => Ok(!operand.is_empty()),
            "-z" => Ok(operand.is_empty()),
            "-e" => Ok(std::fs::symlink_metadata(operand).is_ok()),
            "-f" => Ok(std::fs::metadata(operand).map_or(false, |m| m.is_file())),
            "-d" => Ok(std::fs::metadata(operand).map_or(false, |m| m.is_dir())),
            "-h" | "-L" => Ok(std::fs::symlink_metadata(operand)
                .map_or(false, |m| m.file_type().is_symlink())),
            "-s" => Ok(std::fs::metadata(operand).map_or(false, |m| m.size() > 0)),
            "-r" => Ok(nix::unistd::access(operand, nix::unistd::AccessFlags::R_OK).is_ok()),
            "-w" => Ok(nix::unistd::access(operand, nix::unistd::AccessFlags::W_OK).is_ok()),
            "-x" => Ok(nix::unistd::access(operand, nix::unistd::AccessFlags::X_OK).is_ok()),
            "-p" => Ok(std::fs::metadata(operand)
                .map_or(false, |m| m.permissions().mode() & libc::S_IFMT == libc::S_IFIFO)),
            "-t" => Ok(operand
                .parse::<i32>()
                .map_or(false, |fd| unsafe { libc::isatty(fd) } == 1)),
            _ => return None,
        };
        self.bump();
        Some(result)
    }
}

fn is_binary_op(op: &str) -> bool {
    matches!(
        op,
        "=" | "==" | "!=" | "<" | ">" | "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge"
    )
}

fn binary(lhs: &str, op: &str, rhs: &str) -> Result<bool, String> {
    match op {
        "=" | "==" => return Ok(lhs == rhs),
        "!=" => return Ok(lhs != rhs),
        "<" => return Ok(lhs < rhs),
        ">" => return Ok(lhs > rhs),
        _ => {}
    }
    let a: i64 = lhs
        .trim()
        .parse()
        .map_err(|_| format!("{lhs}: integer expression expected"))?;
    let b: i64 = rhs
        .trim()
        .parse()
        .map_err(|_| format!("{rhs}: integer expression expected"))?;
    Ok(match op {
        "-eq" => a == b,
        "-ne" => a != b,
        "-lt" => a < b,
        "-le" => a <= b,
        "-gt" => a > b,
        "-ge" => a >= b,
        _ => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOptions;

    fn run(args: &[&str]) -> i32 {
        let mut shell = Shell::new(ShellOptions::default());
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        test_cmd(&mut shell, &args).unwrap()
    }

    #[test]
    fn string_tests() {
        assert_eq!(run(&["-n", "x"]), 0);
        assert_eq!(run(&["-z", ""]), 0);
        assert_eq!(run(&["abc", "=", "abc"]), 0);
        assert_eq!(run(&["abc", "!=", "abc"]), 1);
        assert_eq!(run(&["lone"]), 0);
        assert_eq!(run(&[""]), 1);
    }

    #[test]
    fn numeric_tests() {
        assert_eq!(run(&["3", "-lt", "5"]), 0);
        assert_eq!(run(&["5", "-le", "4"]), 1);
        assert_eq!(run(&["10", "-eq", "10"]), 0);
        assert_eq!(run(&["x", "-eq", "1"]), 2);
    }

    #[test]
    fn file_tests() {
        assert_eq!(run(&["-d", "/"]), 0);
        assert_eq!(run(&["-f", "/"]), 1);
        assert_eq!(run(&["-e", "/no/such/path/at/all"]), 1);
    }

    #[test]
    fn connectives() {
        assert_eq!(run(&["x", "-a", "y"]), 0);
        assert_eq!(run(&["x", "-a", ""]), 1);
        assert_eq!(run(&["", "-o", "y"]), 0);
        assert_eq!(run(&["!", ""]), 0);
        assert_eq!(run(&["(", "x", ")"]), 0);
    }

    #[test]
    fn bracket_form_needs_closer() {
        // test_cmd receives `[`'s args with the `]` still attached.
        assert_eq!(run(&["x", "]"]), 0);
    }

    #[test]
    fn empty_is_false() {
        assert_eq!(run(&[]), 1);
    }
}
