use std::fmt;
use std::io::Cursor;

use bytes::Bytes;
use itertools::Itertools;

use crate::frame::Frame;
use crate::link::ExecuteError;

/// A server reply to one request.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// A complete RESP value.
    Frame(Frame),
    /// Bytes that do not form a RESP value. They are shown as-is rather than rejected.
    Malformed(Bytes),
}

impl Reply {
    /// Display text for the reply, in the same shape `execute` returns it.
    pub fn render(&self) -> String {
        match self {
            Reply::Frame(frame) => render_frame(frame),
            Reply::Malformed(bytes) => decode_leading_marker(bytes),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub fn render_frame(frame: &Frame) -> String {
    match frame {
        Frame::Simple(s) => s.clone(),
        Frame::Error(s) => format!("Error: {}", s),
        Frame::Integer(i) => i.to_string(),
        Frame::Bulk(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Frame::Null => "(nil)".to_string(),
        Frame::Array(items) if items.is_empty() => "(empty array)".to_string(),
        Frame::Array(items) => render_array(items),
    }
}

// One element per line, numbered from 1. Continuation lines of nested values are indented under
// their number.
fn render_array(items: &[Frame]) -> String {
    let width = items.len().to_string().len();

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let prefix = format!("{:>width$}) ", index + 1, width = width);
            let indent = " ".repeat(prefix.len());

            render_frame(item)
                .split('\n')
                .enumerate()
                .map(|(line_no, line)| {
                    if line_no == 0 {
                        format!("{}{}", prefix, line)
                    } else {
                        format!("{}{}", indent, line)
                    }
                })
                .join("\n")
        })
        .join("\n")
}

/// Decodes a complete raw response into display text.
pub fn decode(response: &[u8]) -> String {
    if response.is_empty() {
        return format!("Error: {}", ExecuteError::EmptyResponse);
    }

    let mut cursor = Cursor::new(response);
    match Frame::parse(&mut cursor) {
        Ok(frame) => render_frame(&frame),
        Err(_) => decode_leading_marker(response),
    }
}

/// Best-effort decoding that only looks at the type marker. The rest of the response is the
/// content, with trailing CRLF removed.
pub fn decode_leading_marker(response: &[u8]) -> String {
    let Some((&marker, rest)) = response.split_first() else {
        return format!("Error: {}", ExecuteError::EmptyResponse);
    };

    let content = String::from_utf8_lossy(rest);
    let content = content.trim_end_matches(['\r', '\n']);

    match marker {
        b'+' | b':' | b'*' => content.to_string(),
        b'-' => format!("Error: {}", content),
        b'$' => match content.find("\r\n") {
            Some(pos) if pos > 0 => content[pos + 2..].to_string(),
            _ => content.to_string(),
        },
        _ => String::from_utf8_lossy(response).into_owned(),
    }
}
