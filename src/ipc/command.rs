//! Request parsing and reply rendering for the line protocol.
//!
//! A request is one line: a command word followed by whitespace-separated
//! `key=value` tokens.  The command word and the keys are matched
//! case-insensitively; tokens without `=` are ignored.
//!
//! ```text
//! ping
//! subscribe-events
//! list-workspaces-json
//! workspace-add name=web%20docs
//! workspace-rename index=2 name=mail
//! workspace-remove index=3
//! GoToDesktop to=right wrap=no
//! ```
//!
//! Anything that is not a built-in command is handed to the action table
//! with its arguments left exactly as sent.

use crate::encoding::{percent_decode, PercentDecodeError};

/// Output flavour of the list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ping,
    SubscribeEvents,
    ListViews(Format),
    ListWorkspaces(Format),
    /// `None` (or an empty `name=`) lets the registry pick a name.
    WorkspaceAdd { name: Option<String> },
    WorkspaceRename { index: usize, name: String },
    WorkspaceRemove { index: usize },
    Action {
        name: String,
        args: Vec<(String, String)>,
    },
}

/// Why a request was refused.  The `Display` text is what follows `ERROR `
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("usage: workspace-rename index=N name=...")]
    RenameUsage,
    #[error("usage: workspace-remove index=N")]
    RemoveUsage,
    #[error("invalid percent-encoding in name")]
    InvalidName,
    #[error("failed to rename workspace")]
    RenameFailed,
    #[error("failed to remove workspace")]
    RemoveFailed,
    #[error("unknown action")]
    UnknownAction,
    #[error("missing required argument")]
    MissingArgument,
    #[error("line too long")]
    LineTooLong,
    #[error("request is not valid UTF-8")]
    NotUtf8,
}

impl From<PercentDecodeError> for CommandError {
    fn from(_: PercentDecodeError) -> Self {
        CommandError::InvalidName
    }
}

impl Request {
    /// Parse one line.
    ///
    /// Surrounding whitespace is ignored and a blank line yields
    /// `Ok(None)`.  Failures carry the reason to send back; they happen
    /// before anything is executed.
    pub fn parse(line: &str) -> Result<Option<Request>, CommandError> {
        let mut tokens = line.trim().split([' ', '\t']).filter(|t| !t.is_empty());
        let Some(word) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<(&str, &str)> = tokens.filter_map(|t| t.split_once('=')).collect();

        let request = match word.to_ascii_lowercase().as_str() {
            "ping" => Request::Ping,
            "subscribe-events" => Request::SubscribeEvents,
            "list-views" => Request::ListViews(Format::Text),
            "list-views-json" => Request::ListViews(Format::Json),
            "list-workspaces" => Request::ListWorkspaces(Format::Text),
            "list-workspaces-json" => Request::ListWorkspaces(Format::Json),
            "workspace-add" => {
                let name = match arg(&args, "name").filter(|n| !n.is_empty()) {
                    Some(raw) => Some(decode_name(raw)?),
                    None => None,
                };
                Request::WorkspaceAdd { name }
            }
            "workspace-rename" => {
                let index = arg(&args, "index").map_or(0, lenient_int);
                let raw = arg(&args, "name").unwrap_or("");
                if index < 1 || raw.is_empty() {
                    return Err(CommandError::RenameUsage);
                }
                Request::WorkspaceRename {
                    index: index as usize,
                    name: decode_name(raw)?,
                }
            }
            "workspace-remove" => {
                let index = arg(&args, "index").map_or(0, lenient_int);
                if index < 1 {
                    return Err(CommandError::RemoveUsage);
                }
                Request::WorkspaceRemove {
                    index: index as usize,
                }
            }
            _ => Request::Action {
                name: word.to_string(),
                args: args
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        };
        Ok(Some(request))
    }
}

/// Last value given for `key`.
fn arg<'a>(args: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    args.iter()
        .rev()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}

fn decode_name(raw: &str) -> Result<String, CommandError> {
    let bytes = percent_decode(raw)?;
    String::from_utf8(bytes).map_err(|_| CommandError::InvalidName)
}

/// Leading optionally-signed decimal prefix of `s`; `0` when there is none.
fn lenient_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative {
        -value
    } else {
        value
    }
}

/// A reply to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `OK`, optionally followed by a word.
    Ok(Option<String>),
    Error(String),
    /// A complete multi-line or JSON body, sent as is.
    Bulk(String),
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(None)
    }

    pub fn error(reason: impl ToString) -> Self {
        Response::Error(reason.to_string())
    }

    /// The bytes to write to the client.
    pub fn to_wire(&self) -> String {
        match self {
            Response::Ok(None) => "OK\n".to_string(),
            Response::Ok(Some(detail)) => format!("OK {}\n", detail),
            Response::Error(reason) => format!("ERROR {}\n", reason),
            Response::Bulk(body) => body.clone(),
        }
    }
}

impl From<CommandError> for Response {
    fn from(e: CommandError) -> Self {
        Response::error(e)
    }
}
