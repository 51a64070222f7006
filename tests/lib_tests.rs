use pipekit::engine::script::{Step, Terminal, parse_script};
use pipekit::engine::{
    basename, dirname, glob_match, render_template, scan_lines, split_fields,
};
use pipekit::utils::pipekit_toml::{apply_file_to_opts, parse_pipekit_toml};
use pipekit::{Pipe, PipeError, ScriptOpts};

// --- exit status ---

#[test]
fn test_exit_status_table() {
    let cases = [
        ("", 0),
        ("bogus", 0),
        ("exit status bogus", 0),
        ("exit status 127", 127),
        ("exit status 1", 1),
        ("exit status 0", 0),
        ("exit status 1 followed by junk", 0),
    ];
    for (input, want) in cases {
        let mut p = Pipe::new();
        p.set_error(input);
        assert_eq!(p.exit_status(), want, "input {:?}", input);
    }
}

#[test]
fn test_exit_status_no_error() {
    assert_eq!(Pipe::new().exit_status(), 0);
}

#[test]
fn test_exit_status_suffix_after_context() {
    let err = anyhow::anyhow!("exit status 2").context("running grep");
    assert_eq!(PipeError::from(err).exit_status(), 2);
}

#[test]
fn test_exit_status_digits_overflow() {
    let err = PipeError::msg("exit status 99999999999999999999");
    assert_eq!(err.exit_status(), 0);
}

#[test]
fn test_pipe_error_identity() {
    let a = PipeError::msg("same text");
    let b = PipeError::msg("same text");
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
}

#[test]
fn test_pipe_error_display_includes_context() {
    let err = anyhow::anyhow!("inner cause").context("outer step");
    assert_eq!(PipeError::from(err).to_string(), "outer step: inner cause");
}

// --- split_fields ---

#[test]
fn test_split_fields_plain() {
    assert_eq!(
        split_fields("ls -l  /tmp").unwrap(),
        vec!["ls", "-l", "/tmp"]
    );
}

#[test]
fn test_split_fields_single_quotes() {
    assert_eq!(
        split_fields("bash -c 'yes 1 | head -n 5; wait'").unwrap(),
        vec!["bash", "-c", "yes 1 | head -n 5; wait"]
    );
}

#[test]
fn test_split_fields_double_quotes_and_escapes() {
    assert_eq!(
        split_fields(r#"echo "a \"b\" c" d\ e"#).unwrap(),
        vec!["echo", r#"a "b" c"#, "d e"]
    );
}

#[test]
fn test_split_fields_empty_quoted_word() {
    assert_eq!(split_fields("echo ''").unwrap(), vec!["echo", ""]);
}

#[test]
fn test_split_fields_unterminated_quote() {
    assert!(split_fields("echo 'oops").is_err());
    assert!(split_fields("echo \"oops").is_err());
}

#[test]
fn test_split_fields_blank() {
    assert!(split_fields("   ").unwrap().is_empty());
}

// --- render_template ---

#[test]
fn test_render_template_replaces_all() {
    assert_eq!(
        render_template("echo {{.}} {{.}}", &[("{{.}}", "x")]),
        "echo x x"
    );
}

#[test]
fn test_render_template_does_not_rescan_values() {
    let out = render_template(
        "{{.First}}-{{.Second}}",
        &[("{{.First}}", "{{.Second}}"), ("{{.Second}}", "b")],
    );
    assert_eq!(out, "{{.Second}}-b");
}

// --- glob_match ---

#[test]
fn test_glob_match_literal() {
    assert!(glob_match("notes.txt", "notes.txt"));
    assert!(!glob_match("notes.txt", "notes.tx"));
}

#[test]
fn test_glob_match_star() {
    assert!(glob_match("*.log", "foo.log"));
    assert!(glob_match("*.log", ".log"));
    assert!(!glob_match("*.log", "foo.log.txt"));
    assert!(glob_match("node_*", "node_modules"));
    assert!(glob_match("a*b", "ab"));
}

#[test]
fn test_glob_match_question_mark() {
    assert!(glob_match("file?.rs", "file1.rs"));
    assert!(!glob_match("file?.rs", "file.rs"));
}

// --- basename / dirname ---

#[test]
fn test_basename() {
    assert_eq!(basename("a/b/c.txt"), "c.txt");
    assert_eq!(basename("a/b/"), "b");
    assert_eq!(basename("c.txt"), "c.txt");
    assert_eq!(basename("/"), "/");
    assert_eq!(basename(""), ".");
}

#[test]
fn test_dirname() {
    assert_eq!(dirname("a/b/c.txt"), "a/b");
    assert_eq!(dirname("a/b/"), "a");
    assert_eq!(dirname("/usr"), "/");
    assert_eq!(dirname("c.txt"), ".");
    assert_eq!(dirname("/"), "/");
    assert_eq!(dirname(""), ".");
}

// --- scan_lines ---

fn collect_lines(input: &str) -> Vec<String> {
    let mut lines = Vec::new();
    scan_lines(&mut input.as_bytes(), |line| {
        lines.push(line.to_string());
        Ok(true)
    })
    .unwrap();
    lines
}

#[test]
fn test_scan_lines_trailing_newline() {
    assert_eq!(collect_lines("a\nb\n"), vec!["a", "b"]);
}

#[test]
fn test_scan_lines_no_trailing_newline() {
    assert_eq!(collect_lines("a\nb"), vec!["a", "b"]);
}

#[test]
fn test_scan_lines_crlf_and_blank() {
    assert_eq!(collect_lines("a\r\n\nb\r\n"), vec!["a", "", "b"]);
}

#[test]
fn test_scan_lines_empty() {
    assert!(collect_lines("").is_empty());
}

#[test]
fn test_scan_lines_stop_early() {
    let mut seen = Vec::new();
    scan_lines(&mut "1\n2\n3\n".as_bytes(), |line| {
        seen.push(line.to_string());
        Ok(seen.len() < 2)
    })
    .unwrap();
    assert_eq!(seen, vec!["1", "2"]);
}

// --- scripts ---

#[test]
fn test_parse_script_steps_and_terminal() {
    let script = parse_script("match foo | first 2 | count").unwrap();
    assert_eq!(script.steps.len(), 2);
    assert!(matches!(script.steps[0], Step::Match(ref s) if s == "foo"));
    assert!(matches!(script.steps[1], Step::First(2)));
    assert_eq!(script.terminal, Terminal::Count);
}

#[test]
fn test_parse_script_quoted_arguments() {
    let script = parse_script(r#"replace "a b" c | exec "tr a-z A-Z""#).unwrap();
    assert!(matches!(script.steps[0], Step::Replace(ref a, ref b) if a == "a b" && b == "c"));
    assert!(matches!(script.steps[1], Step::Exec(ref c) if c == "tr a-z A-Z"));
    assert_eq!(script.terminal, Terminal::Stdout);
}

#[test]
fn test_parse_script_empty_is_passthrough() {
    let script = parse_script("").unwrap();
    assert!(script.steps.is_empty());
    assert_eq!(
        script.apply(Pipe::echo("same\n")).string().unwrap(),
        "same\n"
    );
}

#[test]
fn test_parse_script_errors() {
    assert!(parse_script("count | first 1").is_err());
    assert!(parse_script("bogus").is_err());
    assert!(parse_script("first x").is_err());
    assert!(parse_script("first").is_err());
    assert!(parse_script("match-regexp '('").is_err());
    assert!(parse_script("match a | | first 1").is_err());
}

#[test]
fn test_script_apply() {
    let script = parse_script("reject skip | replace o 0 | first 2").unwrap();
    let out = script
        .apply(Pipe::echo("foo\nskip me\nboo\nmoo\n"))
        .string()
        .unwrap();
    assert_eq!(out, "f00\nb00\n");
}

#[test]
fn test_script_apply_streaming_with_sync() {
    let script = parse_script("match a | sync | freq").unwrap();
    let out = script
        .apply(Pipe::echo("a\nb\na\nab\n").stream())
        .string()
        .unwrap();
    assert_eq!(out, "2 a\n1 ab\n");
}

// --- config file ---

#[test]
fn test_config_file_applies_present_fields() {
    let file = parse_pipekit_toml("[settings]\nstream = true\nchannel_cap = 8\n").unwrap();
    let mut opts = ScriptOpts {
        verbose: true,
        ..Default::default()
    };
    apply_file_to_opts(&file, &mut opts);
    assert!(opts.stream);
    assert!(opts.verbose);
    assert_eq!(opts.channel_cap, Some(8));
}

#[test]
fn test_config_file_without_settings_section() {
    let file = parse_pipekit_toml("").unwrap();
    let mut opts = ScriptOpts::default();
    apply_file_to_opts(&file, &mut opts);
    assert!(!opts.stream);
    assert_eq!(opts.channel_cap, None);
}

#[test]
fn test_config_file_rejects_bad_types() {
    assert!(parse_pipekit_toml("[settings]\nstream = \"yes\"\n").is_err());
}
