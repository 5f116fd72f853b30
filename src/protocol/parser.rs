//! Incremental Command Framer
//!
//! The memcached text protocol mixes line-delimited commands with
//! length-prefixed data blocks. This parser consumes both from a single
//! accumulation buffer without ever blocking:
//!
//! - `Some((parsed, consumed))` - a complete request was framed and
//!   `consumed` bytes of the buffer belong to it
//! - `None` - the request is incomplete, the caller should read more bytes
//!   and retry
//!
//! This contract lets the connection handler append incoming network data to
//! a buffer, drain every complete request from it, and go back to the socket
//! only when the buffer runs dry, which also gives pipelining for free.
//!
//! ## Framing rules
//!
//! 1. A command line ends at `\n`; a trailing `\r` is stripped (bare `\n` is
//!    tolerated).
//! 2. The line is tokenized on single spaces and the first token is matched
//!    case-insensitively against the command table.
//! 3. Storage commands (`set`, `add`, `replace`, `append`, `prepend`, `cas`)
//!    consume exactly `<bytes> + 2` further octets as their data block. When
//!    the block's last two octets are CRLF they are stripped; otherwise the
//!    whole block is handed to the executor, whose length check answers
//!    `CLIENT_ERROR bad data chunk`.
//! 4. A malformed storage line (wrong arity, or an un-parseable `<bytes>`
//!    argument) still swallows one following line as its data block, so
//!    every request gets exactly one response.
//!
//! Protocol violations never kill the connection; they surface as
//! [`ParsedCommand::Reject`] carrying the error response to send.

use crate::protocol::types::{
    ClientError, Command, ConcatPayload, Response, StorePayload, CRLF,
};
use bytes::Bytes;

/// The outcome of framing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// A well-formed command, ready for the executor.
    Dispatch(Command),
    /// A malformed request; send this response and move on.
    Reject(Response),
}

/// Attempts to frame one request from the front of `buf`.
///
/// Returns the parsed request and the number of bytes it occupied, or `None`
/// when more data is needed.
pub fn parse_command(buf: &[u8]) -> Option<(ParsedCommand, usize)> {
    let newline = find_newline(buf)?;
    let line_len = newline + 1;

    let Ok(line) = std::str::from_utf8(trim_line(&buf[..newline])) else {
        return Some((ParsedCommand::Reject(Response::Error), line_len));
    };

    let tokens: Vec<&str> = line.split(' ').collect();
    let verb = tokens[0].to_ascii_lowercase();

    let parsed = match verb.as_str() {
        "get" | "gets" => {
            if tokens.len() == 1 {
                ParsedCommand::Reject(Response::Error)
            } else {
                let keys = tokens[1..].iter().map(|t| t.to_string()).collect();
                ParsedCommand::Dispatch(match verb.as_str() {
                    "get" => Command::Get { keys },
                    _ => Command::Gets { keys },
                })
            }
        }
        "set" | "add" | "replace" | "append" | "prepend" | "cas" => {
            return parse_storage(&verb, &tokens, buf, line_len);
        }
        "delete" => {
            if tokens.len() != 2 {
                ParsedCommand::Reject(Response::Error)
            } else {
                ParsedCommand::Dispatch(Command::Delete {
                    key: tokens[1].to_string(),
                })
            }
        }
        "incr" | "decr" => {
            if tokens.len() != 3 {
                ParsedCommand::Reject(Response::Error)
            } else {
                match parse_decimal_u64(tokens[2]) {
                    Some(delta) => {
                        let key = tokens[1].to_string();
                        ParsedCommand::Dispatch(match verb.as_str() {
                            "incr" => Command::Incr { key, delta },
                            _ => Command::Decr { key, delta },
                        })
                    }
                    None => ParsedCommand::Reject(Response::ClientError(ClientError::InvalidDelta)),
                }
            }
        }
        "touch" => {
            if tokens.len() != 3 {
                ParsedCommand::Reject(Response::Error)
            } else {
                match tokens[2].parse::<i32>() {
                    Ok(exptime) => ParsedCommand::Dispatch(Command::Touch {
                        key: tokens[1].to_string(),
                        exptime,
                    }),
                    Err(_) => {
                        ParsedCommand::Reject(Response::ClientError(ClientError::InvalidExptime))
                    }
                }
            }
        }
        "flush_all" => ParsedCommand::Dispatch(Command::FlushAll),
        "version" => ParsedCommand::Dispatch(Command::Version),
        _ => ParsedCommand::Reject(Response::Error),
    };

    Some((parsed, line_len))
}

/// Frames a storage command: the command line plus its data block.
fn parse_storage(
    verb: &str,
    tokens: &[&str],
    buf: &[u8],
    line_len: usize,
) -> Option<(ParsedCommand, usize)> {
    let arity = if verb == "cas" { 6 } else { 5 };
    let declared = if tokens.len() == arity {
        // A declaration the frame length computation cannot hold is as
        // malformed as a non-numeric one.
        tokens[4]
            .parse::<usize>()
            .ok()
            .filter(|d| d.checked_add(line_len + 2).is_some())
    } else {
        None
    };

    let Some(declared) = declared else {
        // The data block length is unknowable; swallow one line in its place.
        let newline = find_newline(&buf[line_len..])?;
        return Some((
            ParsedCommand::Reject(Response::Error),
            line_len + newline + 1,
        ));
    };

    let total = line_len + declared + 2;
    if buf.len() < total {
        return None;
    }
    let block = &buf[line_len..total];
    let data = if block.ends_with(CRLF) {
        Bytes::copy_from_slice(&block[..declared])
    } else {
        // Missing terminator: hand over the raw block so the executor's
        // length check answers with bad data chunk.
        Bytes::copy_from_slice(block)
    };

    let key = tokens[1].to_string();

    if verb == "append" || verb == "prepend" {
        // flags and exptime are present on the wire but never parsed for
        // these two, matching the concatenation-only semantics.
        let payload = ConcatPayload {
            key,
            declared_len: declared,
            data,
        };
        let command = match verb {
            "append" => Command::Append(payload),
            _ => Command::Prepend(payload),
        };
        return Some((ParsedCommand::Dispatch(command), total));
    }

    let (Ok(flags), Ok(exptime)) = (tokens[2].parse::<u32>(), tokens[3].parse::<i32>()) else {
        return Some((ParsedCommand::Reject(Response::Error), total));
    };

    let payload = StorePayload {
        key,
        flags,
        exptime,
        declared_len: declared,
        data,
    };
    let parsed = match verb {
        "set" => ParsedCommand::Dispatch(Command::Set(payload)),
        "add" => ParsedCommand::Dispatch(Command::Add(payload)),
        "replace" => ParsedCommand::Dispatch(Command::Replace(payload)),
        _ => match parse_decimal_u64(tokens[5]) {
            Some(cas_token) => ParsedCommand::Dispatch(Command::Cas { payload, cas_token }),
            None => ParsedCommand::Reject(Response::ClientError(ClientError::BadCommandLineFormat)),
        },
    };
    Some((parsed, total))
}

/// Finds the position of the first `\n` in the buffer.
#[inline]
fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Strips a single trailing `\r` left over from a CRLF terminator.
#[inline]
fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(&b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Parses an unsigned 64-bit decimal with no sign, no whitespace and no
/// leading `+`.
fn parse_decimal_u64(token: &str) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
