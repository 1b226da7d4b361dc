// src/cli.rs
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use autofill::values::FieldValue;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wizard", version, about = "Step-by-step form filling with assisted autofill")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Play an autofill pass on a virtual clock and print what happened
    Simulate {
        #[command(flatten)]
        input: Input,
        /// Step to mount
        #[arg(long, default_value_t = 0)]
        step: usize,
        /// Manual write at a point in time, e.g. `prior=@1100` or `extras-0=true@0`
        #[arg(long = "write", value_name = "KEY=VALUE@MS")]
        writes: Vec<ScriptedWrite>,
        /// Print the final presentation as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fill the steps interactively from stdin
    Run {
        #[command(flatten)]
        input: Input,
    },
    /// Validate a steps file
    Check {
        /// Step definitions (JSON)
        #[arg(long)]
        steps: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Input {
    /// Step definitions (JSON)
    #[arg(long)]
    pub steps: PathBuf,
    /// Extraction result per step (JSON)
    #[arg(long)]
    pub prefill: Option<PathBuf>,
    /// Session file; defaults to the configured one
    #[arg(long)]
    pub store: Option<PathBuf>,
}

/// `key=value@ms`
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedWrite {
    pub key: String,
    pub value: FieldValue,
    pub at: Duration,
}

impl FromStr for ScriptedWrite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (assignment, at) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("missing `@ms` in `{s}`"))?;
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("missing `=` in `{s}`"))?;
        if key.is_empty() {
            return Err(format!("empty key in `{s}`"));
        }
        let at: u64 = at.parse().map_err(|e| format!("bad time in `{s}`: {e}"))?;
        Ok(Self {
            key: key.to_string(),
            value: parse_value(value),
            at: Duration::from_millis(at),
        })
    }
}

/// `true`/`false` become flags, everything else text.
pub fn parse_value(raw: &str) -> FieldValue {
    match raw {
        "true" => FieldValue::Flag(true),
        "false" => FieldValue::Flag(false),
        other => FieldValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scripted_write_parses() {
        let w: ScriptedWrite = "extras-0=true@250".parse().unwrap();
        assert_eq!(
            w,
            ScriptedWrite {
                key: "extras-0".into(),
                value: FieldValue::Flag(true),
                at: Duration::from_millis(250),
            }
        );
        let cleared: ScriptedWrite = "prior=@1100".parse().unwrap();
        assert_eq!(cleared.value, FieldValue::Text(String::new()));
        assert!("prior@1".parse::<ScriptedWrite>().is_err());
        assert!("prior=yes".parse::<ScriptedWrite>().is_err());
    }

    #[test]
    fn cli_accepts_repeated_writes() {
        let cli = Cli::try_parse_from([
            "wizard", "simulate", "--steps", "s.json", "--write", "a=1@0", "--write", "b=2@10",
        ])
        .unwrap();
        let Cmd::Simulate { writes, step, .. } = cli.cmd else {
            panic!("expected simulate");
        };
        assert_eq!(step, 0);
        assert_eq!(writes.len(), 2);
    }
}
