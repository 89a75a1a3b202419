//! Task list file format.
//!
//! One task per line:
//!
//! ```text
//! # comment
//! [@timeout=<duration>] [@weight=<number>] [<name>] <program> [args...]
//! ```
//!
//! - blank lines and `#` comments are skipped;
//! - `@`-options must come first on the line;
//! - `<name>` is present only when the list is read in with-name mode;
//! - arguments are split on whitespace, no shell quoting is applied.
use std::{fs, path::Path, time::Duration};

use crate::{ModelError, ModelResult, TaskSpec};

/// Parsing switches for a task list.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskListOptions {
    /// First non-option token of every line is the task name.
    pub with_name: bool,
}

/// Read and parse a task list file.
pub fn read_task_list(path: &Path, opts: TaskListOptions) -> ModelResult<Vec<TaskSpec>> {
    let contents = fs::read_to_string(path)?;
    parse_task_list(&contents, opts)
}

/// Parse task list contents.
///
/// Errors carry the 1-based line number of the offending line.
pub fn parse_task_list(input: &str, opts: TaskListOptions) -> ModelResult<Vec<TaskSpec>> {
    let mut specs = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let spec = parse_line(line, opts).map_err(|reason| ModelError::Parse {
            line: idx + 1,
            reason,
        })?;
        specs.push(spec);
    }
    Ok(specs)
}

fn parse_line(line: &str, opts: TaskListOptions) -> Result<TaskSpec, String> {
    let mut tokens = line.split_whitespace().peekable();

    let mut timeout = None;
    let mut weight = None;
    while let Some(opt) = tokens.next_if(|t| t.starts_with('@')) {
        let (key, value) = opt[1..]
            .split_once('=')
            .ok_or_else(|| format!("option '{opt}' must look like @key=value"))?;
        match key {
            "timeout" => {
                timeout = Some(parse_duration(value).map_err(|e| e.to_string())?);
            }
            "weight" => {
                let w: f64 = value
                    .parse()
                    .map_err(|_| format!("weight '{value}' is not a number"))?;
                weight = Some(w);
            }
            other => return Err(format!("unknown option '@{other}'")),
        }
    }

    let name = if opts.with_name {
        Some(tokens.next().ok_or("missing task name")?.to_string())
    } else {
        None
    };
    let program = tokens.next().ok_or("missing command")?;

    let mut spec = TaskSpec::new(program).with_args(tokens);
    spec.name = name;
    if let Some(t) = timeout {
        spec = spec.with_timeout(t);
    }
    spec.weight = weight;

    spec.validate().map_err(|e| e.to_string())?;
    Ok(spec)
}

/// Parse a human-friendly duration: `500ms`, `30s`, `5m`, `1h`, or bare seconds (`2.5`).
pub fn parse_duration(s: &str) -> ModelResult<Duration> {
    let s = s.trim();
    let (num, scale) = if let Some(n) = s.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = num
        .trim()
        .parse()
        .map_err(|_| ModelError::InvalidDuration(s.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::InvalidDuration(s.to_string()));
    }
    Duration::try_from_secs_f64(value * scale)
        .map_err(|_| ModelError::InvalidDuration(s.to_string()))
}
