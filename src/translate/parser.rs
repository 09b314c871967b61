use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// No numbered line seen yet
    AwaitItem,
    /// Collecting the text of the current item
    InItem,
}

/// Parse a numbered reply (`1. xxx` per line) into exactly `expected` items.
///
/// Unnumbered lines continue the previous item and are joined with a single
/// space; unnumbered lines before the first item are dropped. The numbers
/// themselves are ignored, only their order counts. If the reply holds more
/// items than requested the extras are cut, if it holds fewer the result is
/// padded with empty strings.
pub fn parse_numbered_reply(reply: &str, expected: usize) -> Vec<String> {
    let mut items: Vec<String> = Vec::with_capacity(expected);
    let mut state = ParseState::AwaitItem;

    for line in reply.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match (state, strip_item_marker(line)) {
            (_, Some(text)) => {
                items.push(text.to_string());
                state = ParseState::InItem;
            }
            (ParseState::InItem, None) => {
                if let Some(current) = items.last_mut() {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(line);
                }
            }
            (ParseState::AwaitItem, None) => {
                debug!("Ignoring preamble line: {}", line);
            }
        }
    }

    if items.len() != expected {
        warn!(
            "Reply has {} items but {} were requested; aligning by position",
            items.len(),
            expected
        );
        items.resize(expected, String::new());
    }

    items
}

/// Return the item text if `line` starts with `<digits>.`, e.g. `12. text`.
/// A digit right after the period (`1.5 kg`) is not an item marker.
fn strip_item_marker(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    let rest = line[digits..].strip_prefix('.')?;
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(rest.trim())
}
