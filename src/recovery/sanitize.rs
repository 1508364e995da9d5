//! Single-pass repair of string literals in near-JSON model output.
//!
//! Only string-literal boundaries are tracked; the rest of the JSON grammar
//! is never consulted. Inside a literal, raw newline / carriage return / tab
//! characters are expanded to their escape sequences, and a `"` is taken as
//! the closing quote only when the next non-whitespace character is a
//! structural delimiter (or the input ends). Any other `"` is content and is
//! escaped.
//!
//! A backslash followed by a raw control character is treated as the matching
//! escape sequence (`\` + newline becomes `\n`), so no literal newline,
//! carriage return or tab is left inside a literal.
//!
//! Known limitation: a quote that belongs to the content but happens to be
//! followed by a delimiter closes the literal early. That covers `,`
//! (`"he said "no", then left"`) and equally `:` (`"Mood "golden": hour"`),
//! since the colon has to count as a delimiter for object keys to close.
//! Nothing here tries to guess intent beyond that rule.

/// Scanner state. Escaped means the previous character was a backslash
/// inside a literal, so the current one is taken verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    OutsideString,
    InString,
    InStringEscaped,
}

/// What follows a closing quote in well-formed JSON: a member separator, the
/// end of a container, or the key/value colon.
fn is_closing_delimiter(ch: char) -> bool {
    matches!(ch, ',' | '}' | ']' | ':')
}

fn is_json_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

fn next_non_whitespace(rest: &str) -> Option<char> {
    rest.chars().find(|ch| !is_json_whitespace(*ch))
}

/// A quote inside a literal terminates it only if it is followed by a
/// delimiter or by nothing at all.
fn quote_terminates_string(rest: &str) -> bool {
    next_non_whitespace(rest).map_or(true, is_closing_delimiter)
}

/// Never fails. The output only gains backslashes and expanded control
/// characters; a raw control character after a backslash is swapped for its
/// escape letter.
pub fn sanitize_json_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut state = ScanState::OutsideString;

    for (index, ch) in text.char_indices() {
        state = match state {
            ScanState::OutsideString => {
                out.push(ch);
                if ch == '"' {
                    ScanState::InString
                } else {
                    ScanState::OutsideString
                }
            }
            ScanState::InStringEscaped => {
                match ch {
                    '\n' => out.push('n'),
                    '\r' => out.push('r'),
                    '\t' => out.push('t'),
                    _ => out.push(ch),
                }
                ScanState::InString
            }
            ScanState::InString => match ch {
                '\\' => {
                    out.push(ch);
                    ScanState::InStringEscaped
                }
                '"' => {
                    let rest = &text[index + ch.len_utf8()..];
                    if quote_terminates_string(rest) {
                        out.push('"');
                        ScanState::OutsideString
                    } else {
                        out.push_str("\\\"");
                        ScanState::InString
                    }
                }
                '\n' => {
                    out.push_str("\\n");
                    ScanState::InString
                }
                '\r' => {
                    out.push_str("\\r");
                    ScanState::InString
                }
                '\t' => {
                    out.push_str("\\t");
                    ScanState::InString
                }
                _ => {
                    out.push(ch);
                    ScanState::InString
                }
            },
        };
    }

    out
}
