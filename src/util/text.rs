use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

use unicode_width::UnicodeWidthChar;

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Truncates a string to fit within `max_width` terminal columns, appending
/// "..." when something was cut.
///
/// Widths of 3 or less are too narrow for an ellipsis, so as many characters
/// as fit are returned instead.
///
/// ```
/// use rssreader::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut width = 0;
    let mut cut = None;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if cut.is_none() && width + w > budget {
            cut = Some(idx);
        }
        if width + w > max_width {
            let cut = cut.unwrap_or(idx);
            return if max_width <= ELLIPSIS_WIDTH {
                Cow::Owned(s[..cut].to_string())
            } else {
                Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
            };
        }
        width += w;
    }
    Cow::Borrowed(s)
}

/// SEC-001: Drop control characters from feed-supplied text before it
/// reaches the terminal. Tab and newline are kept.
///
/// Escape sequences go as a whole: CSI (`ESC [` up to its final byte) and
/// OSC (`ESC ]` up to BEL or `ESC \`), so no `[31m` residue is printed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_bad = |c: char| c.is_control() && c != '\t' && c != '\n';
    if !s.chars().any(is_bad) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    skip_csi(&mut chars);
                }
                Some(']') => {
                    chars.next();
                    skip_osc(&mut chars);
                }
                _ => {}
            },
            c if is_bad(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Consume CSI parameter and intermediate bytes through the final byte.
fn skip_csi(chars: &mut Peekable<Chars<'_>>) {
    for c in chars.by_ref() {
        if ('\x40'..='\x7e').contains(&c) {
            break;
        }
    }
}

/// Consume an OSC payload through its BEL or ST terminator.
fn skip_osc(chars: &mut Peekable<Chars<'_>>) {
    while let Some(c) = chars.next() {
        match c {
            '\x07' => break,
            '\x1b' if chars.peek() == Some(&'\\') => {
                chars.next();
                break;
            }
            _ => {}
        }
    }
}

/// Text to show for an article description.
///
/// With `allow_html` the markup is rendered to wrapped plain text; without
/// it the description is shown literally, tags and all.
pub fn render_description(description: &str, allow_html: bool, width: usize) -> String {
    let text = if allow_html {
        html2text::from_read(description.as_bytes(), width.max(1))
            .unwrap_or_else(|_| description.to_string())
    } else {
        description.to_string()
    };
    strip_control_chars(&text).into_owned()
}
