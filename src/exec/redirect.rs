//! Redirection binding
//!
//! Redirections are opened in a scoped manner: the affected descriptors
//! are saved, the redirections applied, and the originals restored when
//! the guard drops — which makes restoration safe on every control path
//! out of an in-shell built-in. Children apply redirections without a
//! guard; their descriptors die with the process.

use std::os::unix::io::RawFd;

use crate::ast::types::{HereDocNode, RedirectOp, RedirectTarget, RedirectionNode};
use crate::exec::ExecError;
use crate::expand::{expand_parts, expand_word_single, pattern, Seg};
use crate::process::fd;
use crate::process::launcher::{self, ProcessConfig, ProcessRole};
use crate::shell::Shell;

/// Heredoc bodies beyond this size get a writer process instead of a
/// single up-front write, so neither side blocks on a full pipe.
const PIPE_WRITE_LIMIT: usize = 64 * 1024;

/// Saved descriptors, restored in reverse order on drop.
pub struct RedirGuard {
    saved: Vec<(RawFd, Option<RawFd>)>,
}

impl Drop for RedirGuard {
    fn drop(&mut self) {
        for &(target, saved) in self.saved.iter().rev() {
            match saved {
                Some(copy) => {
                    let _ = fd::dup2(copy, target);
                    fd::close(copy);
                }
                None => fd::close(target),
            }
        }
    }
}

/// Apply redirections in the shell process, returning the restore guard.
pub fn apply_redirections(
    shell: &mut Shell,
    redirs: &[RedirectionNode],
) -> Result<RedirGuard, ExecError> {
    let mut guard = RedirGuard { saved: Vec::new() };
    for r in redirs {
        let target = r.fd.unwrap_or_else(|| r.operator.default_fd());
        let saved = if fd::is_open(target) {
            Some(
                fd::dup_above(target, 10)
                    .map_err(|e| ExecError::Redirect(e.to_string()))?,
            )
        } else {
            None
        };
        guard.saved.push((target, saved));
        apply_one(shell, r)?;
    }
    Ok(guard)
}

/// Apply redirections in a forked child, with no restore.
pub fn apply_in_child(shell: &mut Shell, redirs: &[RedirectionNode]) -> Result<(), ExecError> {
    for r in redirs {
        apply_one(shell, r)?;
    }
    Ok(())
}

fn apply_one(shell: &mut Shell, r: &RedirectionNode) -> Result<(), ExecError> {
    let target = r.fd.unwrap_or_else(|| r.operator.default_fd());
    match (&r.operator, &r.target) {
        (RedirectOp::Less, RedirectTarget::Word(word)) => {
            let path = expand_target(shell, word)?;
            open_onto(&path, libc::O_RDONLY, target)
        }
        (RedirectOp::Great | RedirectOp::Clobber, RedirectTarget::Word(word)) => {
            let path = expand_target(shell, word)?;
            open_onto(&path, libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC, target)
        }
        (RedirectOp::DGreat, RedirectTarget::Word(word)) => {
            let path = expand_target(shell, word)?;
            open_onto(&path, libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND, target)
        }
        (RedirectOp::LessGreat, RedirectTarget::Word(word)) => {
            let path = expand_target(shell, word)?;
            open_onto(&path, libc::O_RDWR | libc::O_CREAT, target)
        }
        (RedirectOp::GreatAnd | RedirectOp::LessAnd, RedirectTarget::Word(word)) => {
            let spec = expand_target(shell, word)?;
            if spec == "-" {
                fd::close(target);
                return Ok(());
            }
            let source: RawFd = spec.parse().map_err(|_| {
                ExecError::Redirect(format!("{spec}: ambiguous redirect"))
            })?;
            fd::dup2(source, target).map_err(|_| {
                ExecError::Redirect(format!("{source}: bad file descriptor"))
            })
        }
        (RedirectOp::TLess, RedirectTarget::Word(word)) => {
            let mut text = expand_word_single(shell, word)?;
            text.push('\n');
            feed_text(shell, text.into_bytes(), target)
        }
        (RedirectOp::DLess | RedirectOp::DLessDash, RedirectTarget::HereDoc(h)) => {
            let text = heredoc_text(shell, h)?;
            feed_text(shell, text.into_bytes(), target)
        }
        _ => Err(ExecError::Redirect("malformed redirection".to_string())),
    }
}

fn expand_target(shell: &mut Shell, word: &crate::ast::types::WordNode) -> Result<String, ExecError> {
    Ok(expand_word_single(shell, word)?)
}

fn open_onto(path: &str, flags: libc::c_int, target: RawFd) -> Result<(), ExecError> {
    let opened = fd::open(path, flags, 0o666)
        .map_err(|e| ExecError::Redirect(format!("{path}: {e}")))?;
    if opened != target {
        fd::dup2(opened, target)
            .map_err(|e| ExecError::Redirect(format!("{path}: {e}")))?;
        fd::close(opened);
    }
    Ok(())
}

/// The expanded heredoc body: literal when the delimiter was quoted,
/// otherwise phases 3-5 apply.
pub fn heredoc_text(shell: &mut Shell, h: &HereDocNode) -> Result<String, ExecError> {
    if h.quoted {
        return Ok(h.content.flatten_literal());
    }
    let segs = expand_parts(shell, &h.content.parts, true)?;
    let mut out = String::new();
    for seg in segs {
        match seg {
            Seg::Break => out.push(' '),
            Seg::Text { value, .. } => out.push_str(&value),
        }
    }
    Ok(pattern::strip_marks(&out))
}

/// Install a pipe carrying `text` on `target`. Small bodies are written
/// before anything reads; large ones get a writer child.
fn feed_text(shell: &mut Shell, text: Vec<u8>, target: RawFd) -> Result<(), ExecError> {
    let (r, w) = fd::pipe().map_err(|e| ExecError::Redirect(e.to_string()))?;
    if text.len() <= PIPE_WRITE_LIMIT {
        match fd::write_all(w, &text) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => {
                fd::close(r);
                fd::close(w);
                return Err(ExecError::Redirect(e.to_string()));
            }
        }
        fd::close(w);
    } else {
        let cfg = ProcessConfig {
            role: ProcessRole::Single,
            pgid_hint: None,
            foreground: false,
            is_shell_process: false,
            stdin: None,
            stdout: None,
            close_fds: vec![r],
        };
        launcher::launch(shell, &cfg, move |_sh| {
            let _ = fd::write_all(w, &text);
            0
        })
        .map_err(|e| ExecError::Redirect(e.to_string()))?;
        fd::close(w);
    }
    fd::dup2(r, target).map_err(|e| ExecError::Redirect(e.to_string()))?;
    fd::close(r);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::WordNode;
    use crate::shell::ShellOptions;

    #[test]
    fn guard_restores_descriptors() {
        let mut shell = Shell::new(ShellOptions::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let redir = RedirectionNode {
            fd: None,
            operator: RedirectOp::Great,
            target: RedirectTarget::Word(WordNode::literal(path.to_str().unwrap())),
        };
        let before = fd::dup_above(1, 10).unwrap();
        {
            let _guard = apply_redirections(&mut shell, &[redir]).unwrap();
            // stdout now points at the file.
            fd::write_all(1, b"redirected\n").unwrap();
        }
        // Restored: writing to fd 1 no longer lands in the file.
        fd::close(before);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "redirected\n");
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let mut shell = Shell::new(ShellOptions::default());
        let redir = RedirectionNode {
            fd: None,
            operator: RedirectOp::Less,
            target: RedirectTarget::Word(WordNode::literal("/no/such/file/here")),
        };
        assert!(matches!(
            apply_redirections(&mut shell, &[redir]),
            Err(ExecError::Redirect(_))
        ));
    }

    #[test]
    fn herestring_feeds_stdin() {
        let mut shell = Shell::new(ShellOptions::default());
        let redir = RedirectionNode {
            fd: Some(9),
            operator: RedirectOp::TLess,
            target: RedirectTarget::Word(WordNode::literal("hello")),
        };
        let _guard = apply_redirections(&mut shell, &[redir]).unwrap();
        let data = fd::read_to_end(9).unwrap();
        assert_eq!(data, b"hello\n");
    }
}
