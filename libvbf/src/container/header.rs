use std::{ops::Range, sync::OnceLock};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until},
    character::complete::{alpha1, alphanumeric1, char, multispace1, not_line_ending},
    combinator::{all_consuming, recognize, value},
    error::ErrorKind,
    multi::{many0, many0_count},
    sequence::{pair, tuple},
    IResult, Offset,
};
use regex::Regex;
use tracing::trace;

use crate::error::{format_err, Boundary, Result};

/// Header key holding the CRC-32 of every block byte
pub const FILE_CHECKSUM: &str = "file_checksum";

/// The ASCII header at the front of a VBF container
///
/// The original text is kept verbatim so that saving a container only touches
/// the `file_checksum` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbfHeader {
    text: String,
    version: String,
    fields: Vec<(String, String)>,
    checksum_span: Option<Range<usize>>,
}

impl VbfHeader {
    /// Parses the header text (everything up to and including the closing brace)
    ///
    /// # Errors
    ///
    /// This function errors if `vbf_version` or the `header { ... }` block is malformed
    pub fn parse(text: String) -> Result<Self> {
        let (version, fields, checksum_span) = match all_consuming(header_text)(&text) {
            Ok((_, (version, fields))) => (
                version.trim().to_owned(),
                fields
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), v.trim().to_owned()))
                    .collect(),
                fields.iter().find(|(k, _)| *k == FILE_CHECKSUM).map(|(_, v)| {
                    let start = text.offset(v);
                    start..start + v.len()
                }),
            ),
            Err(e) => {
                return Err(format_err(
                    Boundary::Container,
                    format!("invalid VBF header: {e:?}"),
                ))
            }
        };
        trace!("VBF header fields: {fields:?}");
        Ok(Self {
            text,
            version,
            fields,
            checksum_span,
        })
    }

    /// `vbf_version` as written in the file
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Raw value of a header entry, e.g. `sw_part_number`
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All header entries in file order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Declared `file_checksum`, if present and readable
    #[must_use]
    pub fn file_checksum(&self) -> Option<u32> {
        let raw = self.field(FILE_CHECKSUM)?;
        let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
        u32::from_str_radix(hex, 16).ok()
    }

    /// Verbatim header text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Header text with the `file_checksum` value replaced. Headers without the
    /// entry, or with a value that is not hex, are returned untouched.
    pub(crate) fn with_file_checksum(&self, checksum: u32) -> String {
        let Some(span) = self.checksum_span.clone() else {
            return self.text.clone();
        };
        let value =
            checksum_regex().replace(&self.text[span.clone()], format!("0x{checksum:08X}"));
        format!("{}{value}{}", &self.text[..span.start], &self.text[span.end..])
    }
}

fn checksum_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^0[xX][0-9A-Fa-f]+").expect("checksum regex is valid")
    })
}

/// Finds the end of the header: the byte after the brace closing `header {`.
pub(crate) fn find_header_end(bytes: &[u8]) -> Result<usize> {
    #[derive(PartialEq)]
    enum State {
        Code,
        Str,
        LineComment,
        BlockComment,
    }
    let mut state = State::Code;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'/', Some(b'/')) => {
                    state = State::LineComment;
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    i += 1;
                }
                (b'"', _) => state = State::Str,
                (b'{', _) => depth += 1,
                (b'}', _) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
                (b, _) if !b.is_ascii() => break,
                _ => {}
            },
            State::Str if b == b'\\' => i += 1,
            State::Str if b == b'"' => state = State::Code,
            State::LineComment if b == b'\n' => state = State::Code,
            State::BlockComment if b == b'*' && next == Some(b'/') => {
                state = State::Code;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    Err(format_err(
        Boundary::Container,
        "header is not terminated by a closing brace",
    ))
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), not_line_ending))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

fn trivia(input: &str) -> IResult<&str, ()> {
    value((), many0_count(alt((multispace1, line_comment, block_comment))))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// Everything up to the `;` terminating an entry, skipping nested braces and strings
fn raw_value(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (pos, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        &input[pos..],
                        ErrorKind::Char,
                    )));
                }
                depth -= 1;
            }
            ';' if depth == 0 => return Ok((&input[pos..], &input[..pos])),
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        ErrorKind::Eof,
    )))
}

fn entry(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = trivia(input)?;
    let (input, key) = identifier(input)?;
    let (input, _) = tuple((trivia, char('='), trivia))(input)?;
    let (input, raw) = raw_value(input)?;
    let (input, _) = char(';')(input)?;
    Ok((input, (key, raw)))
}

fn header_text(input: &str) -> IResult<&str, (&str, Vec<(&str, &str)>)> {
    let (input, _) = tuple((trivia, tag("vbf_version"), trivia, char('='), trivia))(input)?;
    let (input, version) = take_till(|c| c == ';')(input)?;
    let (input, _) = tuple((char(';'), trivia, tag("header"), trivia, char('{')))(input)?;
    let (input, fields) = many0(entry)(input)?;
    let (input, _) = tuple((trivia, char('}')))(input)?;
    Ok((input, (version, fields)))
}
