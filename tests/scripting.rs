//! End-to-end scenarios run against the built binary.

use std::process::{Command, Output, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_marsh");

fn run(script: &str) -> Output {
    Command::new(BIN)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run the shell")
}

fn stdout_of(script: &str) -> String {
    let out = run(script);
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn status_of(script: &str) -> i32 {
    run(script).status.code().unwrap_or(-1)
}

#[test]
fn word_splitting_collapses_whitespace() {
    assert_eq!(stdout_of("echo \"a b\"   c"), "a b c\n");
}

#[test]
fn pattern_replacement() {
    assert_eq!(stdout_of("x=hello; echo ${x/l/L}"), "heLlo\n");
}

#[test]
fn brace_range_for_loop() {
    assert_eq!(stdout_of("for i in {1..3}; do echo $i; done"), "1\n2\n3\n");
}

#[test]
fn pipeline_status_and_pipefail() {
    assert_eq!(status_of("true | false | true"), 0);
    assert_eq!(status_of("set -o pipefail; true | false | true"), 1);
}

#[test]
fn errexit_stops_the_script() {
    let out = run("set -e; false; echo NO");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn arrays_expand_per_element() {
    assert_eq!(
        stdout_of("a=(one two three); echo \"${a[@]}\" ${#a[@]}"),
        "one two three 3\n"
    );
}

#[test]
fn quoted_heredoc_is_literal() {
    assert_eq!(stdout_of("cat <<'EOF'\n$HOME\nEOF"), "$HOME\n");
}

#[test]
fn unquoted_heredoc_expands() {
    assert_eq!(stdout_of("greet=hi; cat <<EOF\n$greet there\nEOF"), "hi there\n");
}

#[test]
fn command_substitution_strips_trailing_newlines() {
    assert_eq!(stdout_of("x=$(printf 'a\\nb\\n\\n\\n'); printf '%s' \"$x\""), "a\nb");
}

#[test]
fn exit_codes() {
    assert_eq!(status_of("exit 7"), 7);
    assert_eq!(status_of("true"), 0);
    assert_eq!(status_of("false"), 1);
    // Command not found.
    assert_eq!(status_of("definitely-not-a-command-48151623"), 127);
    // Syntax error.
    assert_eq!(status_of("fi"), 2);
}

#[test]
fn and_or_chains() {
    assert_eq!(stdout_of("true && echo yes || echo no"), "yes\n");
    assert_eq!(stdout_of("false && echo yes || echo no"), "no\n");
}

#[test]
fn if_elif_else() {
    let script = "if false; then echo a; elif true; then echo b; else echo c; fi";
    assert_eq!(stdout_of(script), "b\n");
}

#[test]
fn while_loop_with_break_and_continue() {
    let script = "i=0; while true; do i=$((i+1)); \
                  if [ $i -eq 2 ]; then continue; fi; \
                  if [ $i -ge 4 ]; then break; fi; echo $i; done";
    assert_eq!(stdout_of(script), "1\n3\n");
}

#[test]
fn case_with_patterns() {
    let script = "case hello.rs in *.txt) echo text;; *.rs) echo rust;; *) echo other;; esac";
    assert_eq!(stdout_of(script), "rust\n");
}

#[test]
fn functions_and_positional_parameters() {
    let script = "greet() { echo \"hi $1\"; return 3; }; greet there; echo $?";
    assert_eq!(stdout_of(script), "hi there\n3\n");
}

#[test]
fn local_variables_shadow_and_reveal() {
    let script = "x=outer; f() { local x=inner; echo $x; }; f; echo $x";
    assert_eq!(stdout_of(script), "inner\nouter\n");
}

#[test]
fn subshell_isolation() {
    assert_eq!(stdout_of("x=1; (x=2); echo $x"), "1\n");
    assert_eq!(stdout_of("(exit 5); echo $?"), "5\n");
}

#[test]
fn brace_group_runs_in_shell() {
    assert_eq!(stdout_of("x=1; { x=2; }; echo $x"), "2\n");
}

#[test]
fn redirections_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let script = format!(
        "echo first > {p}; echo second >> {p}; cat < {p}",
        p = path.display()
    );
    assert_eq!(stdout_of(&script), "first\nsecond\n");
}

#[test]
fn stderr_duplication() {
    let out = run("echo oops >&2 2>/dev/null");
    assert!(out.stdout.is_empty());
}

#[test]
fn readonly_rejects_assignment() {
    let out = run("readonly r=1; r=2; echo status=$? value=$r");
    let text = String::from_utf8_lossy(&out.stdout);
    assert_eq!(text, "status=1 value=1\n");
}

#[test]
fn unset_variable_with_nounset() {
    let out = run("set -u; echo $missing; echo NO");
    assert_ne!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
}

#[test]
fn ifs_controls_splitting() {
    assert_eq!(stdout_of("IFS=:; v=a:b:c; set -- $v; echo $#"), "3\n");
    // Empty IFS disables splitting entirely.
    assert_eq!(stdout_of("IFS=; v='a b c'; set -- $v; echo $#"), "1\n");
}

#[test]
fn star_joins_with_first_ifs_char() {
    assert_eq!(stdout_of("set -- a b c; IFS=-; echo \"$*\""), "a-b-c\n");
}

#[test]
fn at_keeps_fields() {
    let script = "set -- 'a b' c; n=0; for x in \"$@\"; do n=$((n+1)); done; echo $n";
    assert_eq!(stdout_of(script), "2\n");
}

#[test]
fn arithmetic_expansion() {
    assert_eq!(stdout_of("echo $((2 ** 10)) $((7 % 3))"), "1024 1\n");
    assert_eq!(stdout_of("x=5; echo $((x * 2 + 1))"), "11\n");
}

#[test]
fn tilde_expansion_uses_home() {
    let out = Command::new(BIN)
        .args(["-c", "echo ~"])
        .env("HOME", "/tmp/fakehome")
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout), "/tmp/fakehome\n");
}

#[test]
fn alias_expansion() {
    assert_eq!(stdout_of("alias greet='echo hello'; greet world"), "hello world\n");
}

#[test]
fn eval_builds_commands() {
    assert_eq!(stdout_of("cmd='echo built'; eval $cmd"), "built\n");
}

#[test]
fn backgrounding_and_wait() {
    assert_eq!(status_of("sleep 0.1 & wait $!"), 0);
}

#[test]
fn shift_moves_positionals() {
    assert_eq!(stdout_of("set -- a b c; shift; echo $1 $#"), "b 2\n");
}

#[test]
fn export_reaches_children() {
    assert_eq!(stdout_of("export MARKER=42; sh -c 'echo $MARKER'"), "42\n");
}

#[test]
fn assignment_prefix_is_temporary() {
    assert_eq!(
        stdout_of("MARKER=42 sh -c 'echo $MARKER'; echo \"[$MARKER]\""),
        "42\n[]\n"
    );
}

#[test]
fn pathname_expansion_sorted() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.dat", "a.dat", "c.txt"] {
        std::fs::write(dir.path().join(name), "").unwrap();
    }
    let script = format!("cd {}; echo *.dat", dir.path().display());
    assert_eq!(stdout_of(&script), "a.dat b.dat\n");
}

#[test]
fn unmatched_glob_stays_literal() {
    assert_eq!(stdout_of("echo /nonexistent-dir-xyz/*"), "/nonexistent-dir-xyz/*\n");
}

#[test]
fn quoted_glob_is_literal() {
    assert_eq!(stdout_of("echo '*'"), "*\n");
}

#[test]
fn signal_exit_status_is_128_plus_n() {
    // SIGTERM is 15.
    assert_eq!(status_of("sh -c 'kill -TERM $$'"), 128 + 15);
}

#[test]
fn trap_runs_on_exit() {
    assert_eq!(stdout_of("trap 'echo bye' EXIT; echo hi"), "hi\nbye\n");
}

#[test]
fn heredoc_strip_tabs() {
    assert_eq!(stdout_of("cat <<-EOF\n\t\tdeep\n\tEOF"), "deep\n");
}

#[test]
fn herestring() {
    assert_eq!(stdout_of("cat <<< 'one line'"), "one line\n");
}

#[test]
fn sigpipe_is_silent() {
    // `yes | head` must terminate quietly.
    let out = run("yes | head -n 2");
    assert_eq!(String::from_utf8_lossy(&out.stdout), "y\ny\n");
}

#[test]
fn script_file_with_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.sh");
    std::fs::write(&path, "echo $0 $1 $2 $#\n").unwrap();
    let out = Command::new(BIN)
        .args([path.to_str().unwrap(), "one", "two"])
        .output()
        .unwrap();
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.ends_with(" one two 2\n"));
}

#[test]
fn dollar_zero_and_special_params() {
    assert_eq!(stdout_of("echo $$ | grep -qE '^[0-9]+$' && echo numeric"), "numeric\n");
}

#[test]
fn nested_command_substitution() {
    assert_eq!(stdout_of("echo $(echo $(echo deep))"), "deep\n");
}

#[test]
fn backtick_substitution() {
    assert_eq!(stdout_of("echo `echo old-style`"), "old-style\n");
}

#[test]
fn case_modification_ops() {
    assert_eq!(stdout_of("x=hello; echo ${x^} ${x^^}"), "Hello HELLO\n");
}

#[test]
fn substring_ops() {
    assert_eq!(stdout_of("x=abcdef; echo ${x:1:3} ${x: -2}"), "bcd ef\n");
}

#[test]
fn default_value_ops() {
    assert_eq!(stdout_of("echo ${missing:-fallback}"), "fallback\n");
    assert_eq!(stdout_of("echo ${missing:=assigned}; echo $missing"), "assigned\nassigned\n");
}
