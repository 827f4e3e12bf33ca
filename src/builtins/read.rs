//! read

use crate::exec::ExecError;
use crate::process::fd;
use crate::shell::Shell;

pub fn read_cmd(shell: &mut Shell, args: &[String]) -> Result<i32, ExecError> {
    let mut raw = false;
    let mut prompt = None;
    let mut names = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-r" => raw = true,
            "-p" => {
                prompt = args.get(i + 1).cloned();
                i += 1;
            }
            "--" => {}
            arg => names.push(arg.to_string()),
        }
        i += 1;
    }

    if let Some(p) = prompt {
        eprint!("{p}");
    }

    let (line, eof) = match read_line(raw) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("marsh: read: {e}");
            return Ok(1);
        }
    };

    // Split into the named variables; the last one takes the rest.
    let ifs = shell.ifs();
    let names = if names.is_empty() {
        vec!["REPLY".to_string()]
    } else {
        names
    };
    let fields = split_for_read(&line, &ifs, names.len());
    for (i, name) in names.iter().enumerate() {
        let value = fields.get(i).map(String::as_str).unwrap_or("");
        if let Err(e) = shell.vars.set_scalar(name, value, false) {
            eprintln!("marsh: read: {e}");
            return Ok(1);
        }
    }

    // EOF before a newline reports failure, with the variables still set.
    Ok(i32::from(eof))
}

/// Read one logical line from fd 0, byte by byte so nothing beyond the
/// newline is consumed. Without -r, backslash escapes the next character
/// and a backslash-newline continues the line.
fn read_line(raw: bool) -> std::io::Result<(String, bool)> {
    let mut bytes = Vec::new();
    let mut buf = [0u8; 1];
    let mut eof = false;
    loop {
        let n = fd::read_fd(0, &mut buf)?;
        if n == 0 {
            eof = true;
            break;
        }
        let b = buf[0];
        if b == b'\n' {
            break;
        }
        if b == b'\\' && !raw {
            let n = fd::read_fd(0, &mut buf)?;
            if n == 0 {
                eof = true;
                break;
            }
            if buf[0] != b'\n' {
                bytes.push(buf[0]);
            }
            continue;
        }
        bytes.push(b);
    }
    Ok((String::from_utf8_lossy(&bytes).into_owned(), eof))
}

/// IFS-split for `read`: the last of `count` fields keeps the remaining
/// text (with trailing IFS whitespace trimmed).
fn split_for_read(line: &str, ifs: &str, count: usize) -> Vec<String> {
    if count <= 1 {
        let trimmed = trim_ifs_ws(line, ifs);
        return vec![trimmed.to_string()];
    }
    let mut fields = Vec::new();
    let mut rest = trim_ifs_ws(line, ifs);
    while fields.len() < count - 1 && !rest.is_empty() {
        match rest.find(|c| ifs.contains(c)) {
            Some(pos) => {
                fields.push(rest[..pos].to_string());
                rest = &rest[pos..];
                // Consume the delimiter run.
                let skip = rest
                    .char_indices()
                    .find(|(_, c)| !ifs.contains(*c))
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
                rest = &rest[skip..];
            }
            None => {
                fields.push(rest.to_string());
                rest = "";
            }
        }
    }
    if !rest.is_empty() || fields.len() < count {
        fields.push(rest.to_string());
    }
    fields
}

fn trim_ifs_ws<'a>(s: &'a str, ifs: &str) -> &'a str {
    let ws: Vec<char> = ifs.chars().filter(|c| " \t\n".contains(*c)).collect();
    s.trim_matches(|c| ws.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::split_for_read;

    #[test]
    fn last_name_takes_rest() {
        assert_eq!(
            split_for_read("a b c d", " \t\n", 2),
            vec!["a", "b c d"]
        );
        assert_eq!(
            split_for_read("  x   y  ", " \t\n", 1),
            vec!["x   y"]
        );
    }

    #[test]
    fn missing_fields_are_empty() {
        assert_eq!(split_for_read("only", " \t\n", 3), vec!["only", ""]);
    }
}
