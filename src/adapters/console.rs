//! Line-oriented operator console for the host simulator.
//!
//! ```text
//!   press                          button press (provision / toggle)
//!   set on|off [src=A] [t=MS] [d=MS]   acknowledged Set from node A
//!   setu on|off [src=A] [t=MS] [d=MS]  unacknowledged Set from node A
//!   get DST                        client Get to DST
//!   assist ADDR                    external provisioner assigns ADDR
//!   reset                          factory reset
//!   show                           print node state
//!   quit
//! ```
//!
//! Addresses accept decimal or `0x` hex.

use core::fmt;

/// Sender address used for injected Sets when `src=` is omitted.
pub const DEFAULT_REMOTE: u16 = 0x0100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press,
    RemoteSet {
        value: bool,
        src: u16,
        ack: bool,
        transition_ms: Option<u32>,
        delay_ms: u32,
    },
    Query { dst: u16 },
    Assist { address: u16 },
    Reset,
    Show,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    BadValue(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand(c) => write!(f, "unknown command '{}'", c),
            Self::MissingArgument(a) => write!(f, "missing argument: {}", a),
            Self::BadValue(v) => write!(f, "bad value '{}'", v),
        }
    }
}

impl core::error::Error for ParseError {}

pub fn parse_line(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut words = line.split_whitespace();
    let cmd = words.next().ok_or(ParseError::Empty)?;
    match cmd {
        "press" | "p" => Ok(ConsoleCommand::Press),
        "set" | "setu" => parse_set(cmd == "set", words),
        "get" => Ok(ConsoleCommand::Query {
            dst: parse_addr(words.next().ok_or(ParseError::MissingArgument("DST"))?)?,
        }),
        "assist" => Ok(ConsoleCommand::Assist {
            address: parse_addr(words.next().ok_or(ParseError::MissingArgument("ADDR"))?)?,
        }),
        "reset" => Ok(ConsoleCommand::Reset),
        "show" | "s" => Ok(ConsoleCommand::Show),
        "quit" | "q" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_set<'a>(ack: bool, mut words: impl Iterator<Item = &'a str>) -> Result<ConsoleCommand, ParseError> {
    let value = match words.next().ok_or(ParseError::MissingArgument("on|off"))? {
        "on" | "1" => true,
        "off" | "0" => false,
        other => return Err(ParseError::BadValue(other.to_string())),
    };
    let mut src = DEFAULT_REMOTE;
    let mut transition_ms = None;
    let mut delay_ms = 0;
    for opt in words {
        let (key, val) = opt
            .split_once('=')
            .ok_or_else(|| ParseError::BadValue(opt.to_string()))?;
        match key {
            "src" => src = parse_addr(val)?,
            "t" => transition_ms = Some(parse_num(val)?),
            "d" => delay_ms = parse_num(val)?,
            _ => return Err(ParseError::BadValue(opt.to_string())),
        }
    }
    Ok(ConsoleCommand::RemoteSet { value, src, ack, transition_ms, delay_ms })
}

fn parse_addr(s: &str) -> Result<u16, ParseError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ParseError::BadValue(s.to_string()))
}

fn parse_num(s: &str) -> Result<u32, ParseError> {
    s.parse().map_err(|_| ParseError::BadValue(s.to_string()))
}
