//! PO catalogs as positioned source/target pairs.
//!
//! Message text is decoded by `polib`. The original file text is kept next
//! to the decoded catalog, and saving only rewrites the `msgstr` of messages
//! that were changed: header, comments, flags, obsolete entries and the
//! file's own line wrapping pass through byte for byte.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use polib::catalog::Catalog;
use polib::message::{MessageMutView, MessageView};
use polib::po_file;
use tracing::debug;

use crate::error::{Result, PotransError};

const DEFAULT_PLURAL_FORMS: &str = "nplurals=1; plural=0;";

/// Header fields `polib` insists on, and the stand-in used when a file
/// leaves one out. Stand-ins only feed the parser and are never written.
const REQUIRED_HEADER_FIELDS: [(&str, &str); 9] = [
    ("Project-Id-Version", "PACKAGE VERSION"),
    ("POT-Creation-Date", "YEAR-MO-DA HO:MI+ZONE"),
    ("PO-Revision-Date", "YEAR-MO-DA HO:MI+ZONE"),
    ("Language-Team", "LANGUAGE <LL@li.org>"),
    ("MIME-Version", "1.0"),
    ("Content-Type", "text/plain; charset=UTF-8"),
    ("Content-Transfer-Encoding", "8bit"),
    ("Language", ""),
    ("Plural-Forms", DEFAULT_PLURAL_FORMS),
];

/// One message of a catalog, addressed by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub position: usize,
    pub source_text: String,
    pub target_text: String,
    pub is_plural: bool,
}

impl Entry {
    /// Plural messages are never sent for translation.
    pub fn is_untranslated(&self) -> bool {
        !self.is_plural && !self.source_text.is_empty() && self.target_text.is_empty()
    }
}

pub struct PoCatalog {
    inner: Catalog,
    /// File text as read from disk.
    text: String,
    /// Byte range of each message's `msgstr` lines, `None` for plurals.
    msgstr_spans: Vec<Option<Range<usize>>>,
    edited: BTreeSet<usize>,
    newline: &'static str,
}

impl PoCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PotransError::FileNotFound(path.display().to_string()));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| PotransError::Catalog(format!("Failed to read {}: {}", path.display(), e)))?;

        let catalog = Self::parse(text).map_err(|e| match e {
            PotransError::Catalog(msg) => PotransError::Catalog(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        debug!("Loaded {} messages from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    fn parse(text: String) -> Result<Self> {
        let entries = scan(&text)?;
        let (header, messages) = match entries.split_first() {
            Some((first, rest)) if first.is_header() => (Some(first), rest),
            _ => (None, entries.as_slice()),
        };
        if header.is_none() {
            debug!("Catalog has no header entry");
        }

        let inner = decode(&normalized_text(header, messages))?;
        if inner.count() != messages.len() {
            return Err(PotransError::Catalog(format!(
                "{} duplicate message definitions",
                messages.len() - inner.count()
            )));
        }

        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let msgstr_spans = messages.iter().map(|m| m.msgstr_span.clone()).collect();

        Ok(Self {
            inner,
            text,
            msgstr_spans,
            edited: BTreeSet::new(),
            newline,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.inner
            .messages()
            .enumerate()
            .map(|(position, message)| Entry {
                position,
                source_text: message.msgid().to_string(),
                target_text: message.msgstr().unwrap_or_default().to_string(),
                is_plural: message.is_plural(),
            })
            .collect()
    }

    /// Write translations into the given positions. Returns how many
    /// messages were changed; plural messages are left alone.
    pub fn apply(&mut self, assignments: &BTreeMap<usize, String>) -> usize {
        if assignments.is_empty() {
            return 0;
        }

        let mut changed = 0;
        for (position, mut message) in self.inner.messages_mut().enumerate() {
            let Some(translation) = assignments.get(&position) else {
                continue;
            };
            if message.is_plural() || self.msgstr_spans[position].is_none() {
                debug!("Skipping plural message at position {}", position);
                continue;
            }
            if message.set_msgstr(translation.clone()).is_ok() {
                self.edited.insert(position);
                changed += 1;
            }
        }
        changed
    }

    /// The file text with every changed `msgstr` re-rendered in place.
    fn render(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;

        for (position, message) in self.inner.messages().enumerate() {
            if !self.edited.contains(&position) {
                continue;
            }
            let Some(span) = &self.msgstr_spans[position] else {
                continue;
            };
            out.push_str(&self.text[cursor..span.start]);
            let terminated = self.text[..span.end].ends_with('\n');
            out.push_str(&render_msgstr(message.msgstr().unwrap_or_default(), self.newline, terminated));
            cursor = span.end;
        }

        out.push_str(&self.text[cursor..]);
        out
    }

    /// Serialize to `path`. The catalog is written to a temporary file next
    /// to the destination and renamed over it, so an interrupted write
    /// leaves the previous checkpoint intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".potrans-")
            .suffix(".po.tmp")
            .tempfile_in(dir)?;

        temp.write_all(self.render().as_bytes())?;
        temp.flush()?;

        temp.persist(path)
            .map_err(|e| PotransError::Catalog(format!("Failed to replace {}: {}", path.display(), e.error)))?;

        debug!("Saved {} messages to {}", self.len(), path.display());
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Field {
    Context,
    Id,
    Str,
    Other,
}

/// Keyword lines of one message as they appear in the file.
#[derive(Default)]
struct RawEntry {
    first_line: usize,
    /// Keyword and continuation lines, trimmed.
    lines: Vec<String>,
    has_msgctxt: bool,
    has_msgstr: bool,
    /// Escaped `msgid` and `msgstr` contents, segments joined.
    msgid: String,
    msgstr: String,
    msgstr_span: Option<Range<usize>>,
    field: Option<Field>,
}

impl RawEntry {
    fn is_header(&self) -> bool {
        !self.has_msgctxt && self.msgid.is_empty()
    }
}

fn syntax_error(line: usize, what: &str) -> PotransError {
    PotransError::Catalog(format!("line {}: {}", line, what))
}

fn quoted(s: &str) -> Option<&str> {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn is_plural_msgstr(keyword: &str) -> bool {
    keyword
        .strip_prefix("msgstr[")
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|index| index.parse::<u8>().is_ok_and(|i| i < 10))
}

fn finish(entries: &mut Vec<RawEntry>, current: &mut RawEntry) -> Result<()> {
    if current.lines.is_empty() {
        return Ok(());
    }
    if !current.has_msgstr {
        return Err(syntax_error(current.first_line, "message has no msgstr"));
    }
    entries.push(std::mem::take(current));
    Ok(())
}

/// Split the file into messages, recording where each `msgstr` sits.
/// Comment lines (including `#~` obsolete entries) are left to the
/// original text.
fn scan(text: &str) -> Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    let mut current = RawEntry::default();
    let mut offset = 0;

    for (index, raw_line) in text.split_inclusive('\n').enumerate() {
        let line_no = index + 1;
        let start = offset;
        offset += raw_line.len();

        let line = if index == 0 { raw_line.trim_start_matches('\u{feff}') } else { raw_line };
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            current.field = None;
            if line.is_empty() || current.has_msgstr {
                finish(&mut entries, &mut current)?;
            }
            continue;
        }

        if line.starts_with('"') {
            let value = quoted(line).ok_or_else(|| syntax_error(line_no, "malformed string"))?;
            match current.field {
                Some(Field::Id) => current.msgid.push_str(value),
                Some(Field::Str) => {
                    current.msgstr.push_str(value);
                    if let Some(span) = current.msgstr_span.as_mut() {
                        span.end = offset;
                    }
                }
                Some(Field::Context | Field::Other) => {}
                None => return Err(syntax_error(line_no, "string outside of a message")),
            }
            current.lines.push(line.to_string());
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| syntax_error(line_no, "expected a keyword followed by a string"))?;
        let value = quoted(rest.trim()).ok_or_else(|| syntax_error(line_no, "malformed string"))?;

        if matches!(keyword, "msgctxt" | "msgid") && current.has_msgstr {
            finish(&mut entries, &mut current)?;
        }
        if current.lines.is_empty() {
            current.first_line = line_no;
        }

        let field = match keyword {
            "msgctxt" => {
                current.has_msgctxt = true;
                Field::Context
            }
            "msgid" => {
                current.msgid.push_str(value);
                Field::Id
            }
            "msgid_plural" => Field::Other,
            "msgstr" => {
                current.has_msgstr = true;
                current.msgstr.push_str(value);
                current.msgstr_span = Some(start..offset);
                Field::Str
            }
            k if is_plural_msgstr(k) => {
                current.has_msgstr = true;
                Field::Other
            }
            other => return Err(syntax_error(line_no, &format!("unknown keyword {}", other))),
        };
        current.field = Some(field);
        current.lines.push(format!("{} \"{}\"", keyword, value));
    }

    finish(&mut entries, &mut current)?;
    Ok(entries)
}

/// Mirror of the plural rule syntax `polib` accepts.
fn plural_rules_are_valid(rules: &str) -> bool {
    let mut nplurals = None;
    let mut expr = None;
    for rule in rules.split(';').map(str::trim).filter(|r| !r.is_empty()) {
        match rule.split_once('=') {
            Some(("nplurals", value)) => match value.parse::<usize>() {
                Ok(n) if n > 0 => nplurals = Some(n),
                _ => return false,
            },
            Some(("plural", value)) if !value.is_empty() => expr = Some(value),
            _ => return false,
        }
    }
    nplurals.is_some() && expr.is_some()
}

/// Header fields, still escaped, completed so that `polib` accepts them.
fn normalized_header_fields(escaped: &str) -> Vec<String> {
    let mut fields: Vec<String> = escaped
        .split("\\n")
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect();

    for field in fields.iter_mut() {
        let unusable = match field.split_once(':') {
            Some(("Plural-Forms", rules)) => !plural_rules_are_valid(rules),
            _ => false,
        };
        if unusable {
            debug!("Unusable header field \"{}\", parsing with \"{}\"", field, DEFAULT_PLURAL_FORMS);
            *field = format!("Plural-Forms: {}", DEFAULT_PLURAL_FORMS);
        }
    }

    for (key, default) in REQUIRED_HEADER_FIELDS {
        let present = fields
            .iter()
            .any(|field| field.split_once(':').is_some_and(|(k, _)| k == key));
        if !present {
            debug!("Header has no {} field", key);
            fields.push(format!("{}: {}", key, default));
        }
    }

    fields
}

fn normalized_text(header: Option<&RawEntry>, messages: &[RawEntry]) -> String {
    let mut out = String::from("msgid \"\"\nmsgstr \"\"\n");
    for field in normalized_header_fields(header.map(|h| h.msgstr.as_str()).unwrap_or_default()) {
        out.push_str(&format!("\"{}\\n\"\n", field));
    }
    for message in messages {
        out.push('\n');
        for line in &message.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// `polib` 0.2 only parses from a path.
fn decode(normalized: &str) -> Result<Catalog> {
    let mut temp = tempfile::Builder::new()
        .prefix(".potrans-")
        .suffix(".po")
        .tempfile()?;
    temp.write_all(normalized.as_bytes())?;
    temp.flush()?;

    po_file::parse(temp.path()).map_err(|e| PotransError::Catalog(e.to_string()))
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Multi-line values get the gettext layout: an empty first string, then
/// one string per line.
fn render_msgstr(value: &str, newline: &str, terminated: bool) -> String {
    let lines: Vec<&str> = value.split_inclusive('\n').collect();
    let mut out = if lines.len() <= 1 {
        format!("msgstr \"{}\"", escape(value))
    } else {
        let mut out = String::from("msgstr \"\"");
        for line in lines {
            out.push_str(newline);
            out.push('"');
            out.push_str(&escape(line));
            out.push('"');
        }
        out
    };
    if terminated {
        out.push_str(newline);
    }
    out
}
