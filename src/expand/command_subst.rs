//! Command substitution
//!
//! Phase four: run the captured command text in a forked subshell,
//! collect its stdout, and strip all trailing newlines (interior ones
//! are untouched). The child's exit status becomes `$?` for the
//! surrounding command.

use crate::expand::ExpandError;
use crate::shell::Shell;

pub fn expand_command_subst(shell: &mut Shell, text: &str) -> Result<String, ExpandError> {
    let output = crate::exec::command_substitution_output(shell, text)
        .map_err(|e| ExpandError::Subst(e.to_string()))?;
    let mut s = String::from_utf8_lossy(&output).into_owned();
    while s.ends_with('\n') {
        s.pop();
    }
    Ok(s)
}
