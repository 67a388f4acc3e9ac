//! Line-oriented calendar-object text.
//!
//! Calendar objects travel as iCalendar text: one `NAME;PARAMS:VALUE` property
//! per line, long values folded onto continuation lines that start with a
//! space or tab, and `BEGIN:`/`END:` markers around components. This module
//! parses that text into [`Properties`] and edits single properties in place
//! without touching the rest of the object.
//!
//! Unfolding joins a continuation onto the previous value with a newline
//! after stripping its leading whitespace. [`normalize_summary`] collapses
//! those newlines back into spaces for display.
//!
//! The getters return values exactly as stored, escapes included. Only
//! [`unescape_text`] and [`normalize_summary`] undo escaping.

use std::collections::BTreeMap;
use std::fmt;

/// Component types carried inside a `VCALENDAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// `VTODO`
    Todo,
    /// `VEVENT`
    Event,
    /// `VJOURNAL`
    Journal,
    /// `VCALENDAR`
    Calendar,
}

impl Component {
    /// Returns the component name as written after `BEGIN:`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "VTODO",
            Self::Event => "VEVENT",
            Self::Journal => "VJOURNAL",
            Self::Calendar => "VCALENDAR",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unfolded property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name, case preserved.
    pub name: String,
    /// Parameters in order of appearance, e.g. `("TZID", "Europe/Paris")`.
    pub params: Vec<(String, String)>,
    /// Unfolded value, escapes preserved.
    pub value: String,
}

impl Property {
    /// Returns the value of parameter `name`, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Flat property mapping of a calendar object.
///
/// When a name repeats, the later line overwrites the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, Property>,
}

impl Properties {
    /// Returns the unfolded value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|p| p.value.as_str())
    }

    /// Returns the full property, parameters included.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.entries.get(name)
    }

    /// Returns the number of distinct property names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no property was parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over property names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn insert(&mut self, property: Property) {
        self.entries.insert(property.name.clone(), property);
    }

    fn append_continuation(&mut self, name: &str, text: &str) {
        if let Some(property) = self.entries.get_mut(name) {
            property.value.push('\n');
            property.value.push_str(text);
        }
    }
}

/// Parses every property of `raw`, skipping `BEGIN:`/`END:` markers.
///
/// Never fails: malformed lines are ignored and blank input yields an empty
/// mapping.
pub fn parse_properties(raw: &str) -> Properties {
    collect(raw.lines())
}

/// Parses only the first `BEGIN:{component}` block of `raw`.
///
/// Falls back to [`parse_properties`] when the block is absent, so bare
/// property lists still parse.
pub fn parse_component(raw: &str, component: Component) -> Properties {
    match component_lines(raw, component) {
        Some(lines) => collect(lines.into_iter()),
        None => parse_properties(raw),
    }
}

fn collect<'a>(lines: impl Iterator<Item = &'a str>) -> Properties {
    let mut properties = Properties::default();
    let mut last: Option<String> = None;

    for line in lines {
        if is_continuation(line) {
            if let Some(name) = &last {
                properties.append_continuation(name, line.trim_start());
            }
            continue;
        }
        if is_marker(line) {
            last = None;
            continue;
        }
        match parse_line(line) {
            Some(property) => {
                last = Some(property.name.clone());
                properties.insert(property);
            }
            None => last = None,
        }
    }

    properties
}

/// Returns the unfolded value of the first property called `name`.
///
/// Lookup is case-sensitive and the value keeps its escapes.
pub fn get_property(raw: &str, name: &str) -> Option<String> {
    find_property(raw, name).map(|p| p.value)
}

/// Returns the first property called `name`, parameters included.
pub fn find_property(raw: &str, name: &str) -> Option<Property> {
    let mut found: Option<Property> = None;

    for line in raw.lines() {
        if let Some(property) = found.as_mut() {
            if is_continuation(line) {
                property.value.push('\n');
                property.value.push_str(line.trim_start());
                continue;
            }
            break;
        }
        if is_continuation(line) || is_marker(line) {
            continue;
        }
        if let Some(property) = parse_line(line).filter(|p| p.name == name) {
            found = Some(property);
        }
    }

    found
}

/// Sets `name` to the escaped `value`.
///
/// An existing property (and its continuation lines) is replaced in place.
/// Otherwise the line goes right before `END:{component}`.
pub fn update_property(raw: &str, name: &str, value: &str, component: Component) -> String {
    set_property_line(raw, name, &format!("{name}:{}", escape_text(value)), component)
}

/// Like [`update_property`] but writes `line` verbatim, for values that
/// carry parameters such as `DUE;VALUE=DATE:20250712`.
pub fn set_property_line(raw: &str, name: &str, line: &str, component: Component) -> String {
    let mut doc = Document::new(raw);
    match doc.position(name, component) {
        Some((start, end)) => {
            doc.lines.drain(start..end);
            doc.lines.insert(start, line.to_string());
        }
        None => doc.insert_before_end(line, component),
    }
    doc.render()
}

/// Adds `line` before `END:{component}` even if the property already exists.
pub fn insert_property(raw: &str, line: &str, component: Component) -> String {
    let mut doc = Document::new(raw);
    doc.insert_before_end(line, component);
    doc.render()
}

/// Removes every occurrence of `name` in `component`, with its
/// continuation lines.
pub fn remove_property(raw: &str, name: &str, component: Component) -> String {
    let mut doc = Document::new(raw);
    while let Some((start, end)) = doc.position(name, component) {
        doc.lines.drain(start..end);
    }
    doc.render()
}

/// Returns the first `BEGIN:{component}` .. `END:{component}` block,
/// markers included.
pub fn component_block(raw: &str, component: Component) -> Option<String> {
    let begin = format!("BEGIN:{component}");
    let end = format!("END:{component}");
    let mut block: Option<Vec<&str>> = None;

    for line in raw.lines() {
        match block.as_mut() {
            None if line == begin => block = Some(vec![line]),
            None => {}
            Some(lines) => {
                lines.push(line);
                if line == end {
                    return Some(lines.join("\n"));
                }
            }
        }
    }

    None
}

/// Escapes text for a property value.
///
/// Backslash goes first so the escapes added afterwards are not doubled.
pub fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Reverses [`escape_text`]. `\n` and `\N` become real line breaks.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other @ (',' | ';' | '\\')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Normalizes a `SUMMARY` value for display.
///
/// Folding artifacts (real line breaks and runs of whitespace) collapse to
/// single spaces first, then escapes are undone. An escaped `\n` therefore
/// survives as an intentional line break.
pub fn normalize_summary(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    unescape_text(&collapsed)
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn is_marker(line: &str) -> bool {
    line.starts_with("BEGIN:") || line.starts_with("END:")
}

/// Splits `NAME;P=V:VALUE` at the first colon outside a quoted parameter.
fn parse_line(line: &str) -> Option<Property> {
    let mut in_quotes = false;
    let colon = line.char_indices().find_map(|(i, c)| match c {
        '"' => {
            in_quotes = !in_quotes;
            None
        }
        ':' if !in_quotes => Some(i),
        _ => None,
    })?;

    let (head, value) = (&line[..colon], &line[colon + 1..]);
    let mut parts = head.split(';');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return None;
    }

    let params = parts
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            Some((key.to_string(), value.trim_matches('"').to_string()))
        })
        .collect();

    Some(Property {
        name: name.to_string(),
        params,
        value: value.to_string(),
    })
}

fn line_name(line: &str) -> Option<&str> {
    if is_continuation(line) || is_marker(line) {
        return None;
    }
    let end = line.find([';', ':'])?;
    Some(&line[..end])
}

fn component_lines(raw: &str, component: Component) -> Option<Vec<&str>> {
    let begin = format!("BEGIN:{component}");
    let end = format!("END:{component}");
    let mut lines = raw.lines().skip_while(|line| *line != begin);
    lines.next()?;

    let mut block = Vec::new();
    let mut depth = 0usize;
    for line in lines {
        if line == end && depth == 0 {
            return Some(block);
        }
        // Nested components (VALARM) are skipped so their properties do not
        // shadow the parent's.
        if line.starts_with("BEGIN:") {
            depth += 1;
        } else if line.starts_with("END:") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            block.push(line);
        }
    }

    Some(block)
}

/// Raw text split into owned lines, remembering the line ending.
struct Document {
    lines: Vec<String>,
    newline: &'static str,
    trailing: bool,
}

impl Document {
    fn new(raw: &str) -> Self {
        let newline = if raw.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            lines: raw.lines().map(str::to_string).collect(),
            newline,
            trailing: raw.ends_with('\n'),
        }
    }

    /// Line range covering the first `name` property of `component`, and
    /// its continuations. Properties of nested components do not count.
    /// Without a `component` block the whole document is searched.
    fn position(&self, name: &str, component: Component) -> Option<(usize, usize)> {
        let begin = format!("BEGIN:{component}");
        let end = format!("END:{component}");
        let (from, scoped) = match self.lines.iter().position(|l| *l == begin) {
            Some(index) => (index + 1, true),
            None => (0, false),
        };

        let mut depth = 0usize;
        let mut start = None;
        for (index, line) in self.lines.iter().enumerate().skip(from) {
            if scoped && depth == 0 && *line == end {
                break;
            }
            if line.starts_with("BEGIN:") {
                depth += 1;
            } else if line.starts_with("END:") {
                depth = depth.saturating_sub(1);
            } else if (depth == 0 || !scoped) && line_name(line) == Some(name) {
                start = Some(index);
                break;
            }
        }

        let start = start?;
        let len = self.lines[start + 1..]
            .iter()
            .take_while(|line| is_continuation(line))
            .count();
        Some((start, start + 1 + len))
    }

    fn insert_before_end(&mut self, line: &str, component: Component) {
        let end = format!("END:{component}");
        match self.lines.iter().position(|l| *l == end) {
            Some(index) => self.lines.insert(index, line.to_string()),
            None => self.lines.push(line.to_string()),
        }
    }

    fn render(&self) -> String {
        let mut out = self.lines.join(self.newline);
        if self.trailing {
            out.push_str(self.newline);
        }
        out
    }
}
