//! Pathname expansion
//!
//! Phase seven: fields containing unprotected `*`, `?`, or `[` are
//! matched against the filesystem, component by component, and the
//! results sorted. A field with no match stays literal unless `nullglob`
//! drops it or `failglob` turns it into an error. Dotfiles match only
//! when the pattern component starts with a literal dot (or `dotglob`
//! is set).

use crate::expand::pattern::{self, LITERAL_MARK};
use crate::expand::ExpandError;
use crate::shell::Shell;

/// Run pathname expansion over the split fields.
pub fn expand_fields(shell: &Shell, fields: Vec<String>) -> Result<Vec<String>, ExpandError> {
    if shell.opts.noglob {
        return Ok(fields);
    }
    let mut out = Vec::new();
    for field in fields {
        if !pattern::has_unquoted_glob(&field) {
            out.push(field);
            continue;
        }
        let mut matches = glob_field(&field, shell.opts.dotglob);
        if matches.is_empty() {
            if shell.opts.failglob {
                return Err(ExpandError::NoMatch(pattern::strip_marks(&field)));
            }
            if !shell.opts.nullglob {
                out.push(field);
            }
        } else {
            matches.sort();
            out.extend(matches);
        }
    }
    Ok(out)
}

/// Expand one field against the filesystem. The returned paths carry no
/// literal markers.
fn glob_field(field: &str, dotglob: bool) -> Vec<String> {
    let absolute = field.starts_with('/');
    let wants_dir = field.ends_with('/');
    let components: Vec<&str> = field.split('/').filter(|c| !c.is_empty()).collect();

    let mut prefixes: Vec<String> = vec![if absolute {
        "/".to_string()
    } else {
        String::new()
    }];

    for (ci, comp) in components.iter().enumerate() {
        let last = ci == components.len() - 1;
        let mut next = Vec::new();
        for prefix in &prefixes {
            if !pattern::has_unquoted_glob(comp) {
                // Literal component: descend without reading the
                // directory, but the path must exist.
                let candidate = join(prefix, &pattern::strip_marks(comp));
                if std::fs::symlink_metadata(&candidate).is_ok() {
                    next.push(candidate);
                }
                continue;
            }
            let re = match pattern::compile(comp) {
                Some(re) => re,
                None => continue,
            };
            let dir = if prefix.is_empty() { "." } else { prefix.as_str() };
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            let dot_ok = dotglob || starts_with_literal_dot(comp);
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = match name.to_str() {
                    Some(name) => name,
                    None => continue,
                };
                if name.starts_with('.') && !dot_ok {
                    continue;
                }
                if re.is_match(name) {
                    next.push(join(prefix, name));
                }
            }
        }
        // Intermediate components must be traversable directories.
        if !last {
            next.retain(|p| std::fs::metadata(p).map_or(false, |m| m.is_dir()));
        }
        prefixes = next;
        if prefixes.is_empty() {
            return Vec::new();
        }
    }

    if wants_dir {
        prefixes.retain(|p| std::fs::metadata(p).map_or(false, |m| m.is_dir()));
        for p in &mut prefixes {
            p.push('/');
        }
    }
    prefixes
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if prefix.ends_with('/') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}/{name}")
    }
}

/// Does the pattern component begin with a literal (possibly marked) dot?
fn starts_with_literal_dot(comp: &str) -> bool {
    let mut chars = comp.chars();
    match chars.next() {
        Some('.') => true,
        Some(LITERAL_MARK) => chars.next() == Some('.'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{Shell, ShellOptions};
    use std::fs;

    fn setup() -> (tempfile::TempDir, Shell) {
        let dir = tempfile::tempdir().unwrap();
        for name in ["alpha.txt", "beta.txt", "gamma.log", ".hidden"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inner.txt"), "").unwrap();
        (dir, Shell::new(ShellOptions::default()))
    }

    fn glob_in(dir: &std::path::Path, shell: &Shell, pat: &str) -> Vec<String> {
        let pat = format!("{}/{}", dir.display(), pat);
        let out = expand_fields(shell, vec![pat]).unwrap();
        out.iter()
            .map(|p| {
                p.strip_prefix(&format!("{}/", dir.display()))
                    .unwrap_or(p)
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn star_matches_sorted() {
        let (dir, shell) = setup();
        assert_eq!(
            glob_in(dir.path(), &shell, "*.txt"),
            vec!["alpha.txt", "beta.txt"]
        );
    }

    #[test]
    fn question_and_brackets() {
        let (dir, shell) = setup();
        assert_eq!(
            glob_in(dir.path(), &shell, "?amma.log"),
            vec!["gamma.log"]
        );
        assert_eq!(
            glob_in(dir.path(), &shell, "[ab]*.txt"),
            vec!["alpha.txt", "beta.txt"]
        );
    }

    #[test]
    fn dotfiles_need_literal_dot() {
        let (dir, mut shell) = setup();
        let all = glob_in(dir.path(), &shell, "*");
        assert!(!all.contains(&".hidden".to_string()));
        assert_eq!(glob_in(dir.path(), &shell, ".h*"), vec![".hidden"]);
        shell.opts.dotglob = true;
        let all = glob_in(dir.path(), &shell, "*");
        assert!(all.contains(&".hidden".to_string()));
    }

    #[test]
    fn no_match_stays_literal() {
        let (dir, shell) = setup();
        let pat = format!("{}/nope*", dir.path().display());
        let out = expand_fields(&shell, vec![pat.clone()]).unwrap();
        assert_eq!(out, vec![pat]);
    }

    #[test]
    fn nullglob_drops_and_failglob_errors() {
        let (dir, mut shell) = setup();
        let pat = format!("{}/nope*", dir.path().display());
        shell.opts.nullglob = true;
        assert!(expand_fields(&shell, vec![pat.clone()]).unwrap().is_empty());
        shell.opts.nullglob = false;
        shell.opts.failglob = true;
        assert!(expand_fields(&shell, vec![pat]).is_err());
    }

    #[test]
    fn multi_component_patterns() {
        let (dir, shell) = setup();
        assert_eq!(
            glob_in(dir.path(), &shell, "*/inner.*"),
            vec!["sub/inner.txt"]
        );
    }

    #[test]
    fn protected_metachars_do_not_glob() {
        let (dir, shell) = setup();
        let pat = format!("{}/{}", dir.path().display(), pattern::protect("*.txt"));
        let out = expand_fields(&shell, vec![pat.clone()]).unwrap();
        // The field is not a glob at all; it passes through untouched.
        assert_eq!(out, vec![pat]);
    }
}
