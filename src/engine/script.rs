//! Pipeline scripts: `match foo | replace a b | first 10` parsed into stages and applied to a pipe.

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::Pipe;
use crate::engine::tools::split_fields;

/// One filter stage of a script.
#[derive(Clone, Debug)]
pub enum Step {
    Match(String),
    MatchRegexp(Regex),
    Reject(String),
    RejectRegexp(Regex),
    Replace(String, String),
    ReplaceRegexp(Regex, String),
    First(usize),
    Last(usize),
    Column(usize),
    Freq,
    Join,
    Concat,
    Basename,
    Dirname,
    Sha256Sums,
    Blake3Sums,
    Exec(String),
    ExecForEach(String),
    ExecReduce(String, String),
    /// Drain everything before continuing (turns streaming off).
    Sync,
}

/// How a script ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Terminal {
    /// Copy the output to stdout.
    #[default]
    Stdout,
    /// Print the number of lines.
    Count,
    /// Print the SHA-256 of the output.
    Sha256,
}

/// A parsed script.
#[derive(Clone, Debug, Default)]
pub struct Script {
    pub steps: Vec<Step>,
    pub terminal: Terminal,
}

fn expect_args<'a>(word: &str, args: &'a [String], n: usize) -> Result<&'a [String]> {
    if args.len() != n {
        bail!(
            "`{}` takes {} argument(s), got {}",
            word,
            n,
            args.len()
        );
    }
    Ok(args)
}

fn regex_arg(word: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("`{word}`: invalid regex {pattern:?}"))
}

fn count_arg(word: &str, arg: &str) -> Result<usize> {
    arg.parse::<usize>()
        .with_context(|| format!("`{word}`: expected a number, got {arg:?}"))
}

fn parse_step(word: &str, args: &[String]) -> Result<Step> {
    let step = match word {
        "match" => Step::Match(expect_args(word, args, 1)?[0].clone()),
        "match-regexp" => Step::MatchRegexp(regex_arg(word, &expect_args(word, args, 1)?[0])?),
        "reject" => Step::Reject(expect_args(word, args, 1)?[0].clone()),
        "reject-regexp" => Step::RejectRegexp(regex_arg(word, &expect_args(word, args, 1)?[0])?),
        "replace" => {
            let a = expect_args(word, args, 2)?;
            Step::Replace(a[0].clone(), a[1].clone())
        }
        "replace-regexp" => {
            let a = expect_args(word, args, 2)?;
            Step::ReplaceRegexp(regex_arg(word, &a[0])?, a[1].clone())
        }
        "first" => Step::First(count_arg(word, &expect_args(word, args, 1)?[0])?),
        "last" => Step::Last(count_arg(word, &expect_args(word, args, 1)?[0])?),
        "column" => Step::Column(count_arg(word, &expect_args(word, args, 1)?[0])?),
        "freq" => {
            expect_args(word, args, 0)?;
            Step::Freq
        }
        "join" => {
            expect_args(word, args, 0)?;
            Step::Join
        }
        "concat" => {
            expect_args(word, args, 0)?;
            Step::Concat
        }
        "basename" => {
            expect_args(word, args, 0)?;
            Step::Basename
        }
        "dirname" => {
            expect_args(word, args, 0)?;
            Step::Dirname
        }
        "sha256-sums" => {
            expect_args(word, args, 0)?;
            Step::Sha256Sums
        }
        "blake3-sums" => {
            expect_args(word, args, 0)?;
            Step::Blake3Sums
        }
        "exec" => Step::Exec(expect_args(word, args, 1)?[0].clone()),
        "exec-for-each" => Step::ExecForEach(expect_args(word, args, 1)?[0].clone()),
        "exec-reduce" => {
            let a = expect_args(word, args, 2)?;
            Step::ExecReduce(a[0].clone(), a[1].clone())
        }
        "sync" => {
            expect_args(word, args, 0)?;
            Step::Sync
        }
        other => bail!("unknown stage `{other}`"),
    };
    Ok(step)
}

/// Parse a script. Stages are separated by a bare `|` word; `count` and `sha256` may only
/// appear last.
pub fn parse_script(text: &str) -> Result<Script> {
    let words = split_fields(text)?;
    let mut script = Script::default();
    let groups: Vec<&[String]> = words.split(|w| w == "|").collect();
    let last = groups.len().saturating_sub(1);

    for (i, group) in groups.into_iter().enumerate() {
        let Some((word, args)) = group.split_first() else {
            if words.is_empty() {
                break;
            }
            bail!("empty stage at position {}", i + 1);
        };
        match word.as_str() {
            "count" | "sha256" if i != last => {
                bail!("`{word}` must be the last stage")
            }
            "count" => {
                expect_args(word, args, 0)?;
                script.terminal = Terminal::Count;
            }
            "sha256" => {
                expect_args(word, args, 0)?;
                script.terminal = Terminal::Sha256;
            }
            _ => script.steps.push(parse_step(word, args)?),
        }
    }
    Ok(script)
}

impl Step {
    /// Chain this step onto `pipe`.
    pub fn apply(self, pipe: Pipe) -> Pipe {
        match self {
            Step::Match(s) => pipe.match_str(s),
            Step::MatchRegexp(re) => pipe.match_regexp(re),
            Step::Reject(s) => pipe.reject(s),
            Step::RejectRegexp(re) => pipe.reject_regexp(re),
            Step::Replace(search, replacement) => pipe.replace(search, replacement),
            Step::ReplaceRegexp(re, replacement) => pipe.replace_regexp(re, replacement),
            Step::First(n) => pipe.first(n),
            Step::Last(n) => pipe.last(n),
            Step::Column(n) => pipe.column(n),
            Step::Freq => pipe.freq(),
            Step::Join => pipe.join(),
            Step::Concat => pipe.concat(),
            Step::Basename => pipe.basename(),
            Step::Dirname => pipe.dirname(),
            Step::Sha256Sums => pipe.sha256_sums(),
            Step::Blake3Sums => pipe.blake3_sums(),
            Step::Exec(cmd) => pipe.exec(cmd),
            Step::ExecForEach(template) => pipe.exec_for_each(template),
            Step::ExecReduce(template, init) => pipe.exec_reduce(template, init),
            Step::Sync => pipe.synchronize(),
        }
    }
}

impl Script {
    /// Chain every filter step onto `pipe`. The terminal is left to the caller.
    pub fn apply(self, pipe: Pipe) -> Pipe {
        self.steps.into_iter().fold(pipe, |pipe, step| step.apply(pipe))
    }
}
