//! CLI utilities for the qipc client.
//!
//! The utilities present in this module can be used to build an interactive console
//! that forwards q expressions to a remote process.
use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Prompt written before every line of input.
pub const PROMPT: &str = "q) ";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("console IO error: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `\\` or end of input
    Exit,
    /// Blank line
    Empty,
    /// q expression to evaluate remotely
    Query(String),
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        match line.trim() {
            "\\\\" => Command::Exit,
            "" => Command::Empty,
            query => Command::Query(query.to_string()),
        }
    }
}

/// Prompt the user for the next command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CliError>
where
    R: BufRead,
    W: Write,
{
    write!(&mut writer, "{PROMPT}")?;
    writer.flush()?;

    let mut s = String::default();
    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }
    Ok(Command::from(s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b"\\\\\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("q) ", output);
    }

    #[test]
    fn prompt_handles_queries() {
        let input = b"select from trade\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(Command::Query("select from trade".to_string()), res);
    }

    #[test]
    fn prompt_exit_commands() {
        let mut output = Vec::new();
        assert_eq!(prompt(&b"\\\\\n"[..], &mut output).unwrap(), Command::Exit);
        assert_eq!(prompt(&b""[..], &mut output).unwrap(), Command::Exit);
    }

    #[test]
    fn prompt_blank_line() {
        let mut output = Vec::new();
        assert_eq!(prompt(&b"   \n"[..], &mut output).unwrap(), Command::Empty);
    }
}
