//! `CREATE TABLE` definition parser.
//!
//! Recovers a [`TableDescriptor`] from the definition text the engine stores
//! for a table. Only the grammar this crate emits is understood, plus the
//! common SQLite table constraints (`PRIMARY KEY(...)`, `CHECK(...)`, ...)
//! which are kept verbatim.
//!
//! The outermost parenthesized body is split on top-level commas first
//! (commas inside parentheses, string literals and quoted identifiers do not
//! count). Each fragment is then classified on its own:
//!
//! - an optional `CONSTRAINT <name>` prefix is peeled off
//! - `UNIQUE(a, b)` becomes a unique group
//! - `FOREIGN KEY(c) REFERENCES t(p)` with optional `ON DELETE`/`ON UPDATE`
//!   actions becomes a foreign key
//! - any other fragment led by a constraint keyword is kept verbatim
//! - everything else is a column: a name plus its raw type clause

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::types::{
    ColumnDescriptor, ForeignKeyAction, ForeignKeyDescriptor, TableDescriptor, UniqueConstraint,
};

/// Errors raised while parsing a table definition.
///
/// Parsing is all-or-nothing: no partial descriptor is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The definition has no parenthesized column list.
    #[error("definition has no parenthesized column list")]
    MissingColumnList,
    /// Parentheses do not balance.
    #[error("unbalanced parentheses in definition")]
    UnbalancedParentheses,
    /// A quoted literal or identifier is never closed.
    #[error("unterminated quote in definition")]
    UnterminatedQuote,
    /// A `FOREIGN KEY(...)` clause is not followed by `REFERENCES`.
    #[error("foreign key clause without REFERENCES: {0}")]
    MissingReferences(String),
    /// The `REFERENCES` target is not of the form `table(column)`.
    #[error("malformed REFERENCES target after: {0}")]
    MalformedReference(String),
    /// A foreign key spans more than one column.
    #[error("composite foreign keys are not supported: {0}")]
    CompositeForeignKey(String),
    /// A foreign key carries clauses other than `ON DELETE`/`ON UPDATE`.
    #[error("unsupported text after foreign key: {0}")]
    UnsupportedForeignKeyClause(String),
}

/// Identifier: double-quoted, backquoted, bracketed or bare.
const IDENTIFIER: &str = r#"(?:"(?:[^"]|"")*"|`(?:[^`]|``)*`|\[[^\]]*\]|[^\s"`\[(),]+)"#;

static CONSTRAINT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)^CONSTRAINT\s+({IDENTIFIER})\s*(.*)$"))
        .expect("static regex must compile")
});
static UNIQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^UNIQUE\s*\(([^()]*)\)$").expect("static regex must compile")
});
static FOREIGN_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^FOREIGN\s+KEY\s*\(([^()]*)\)(.*)$").expect("static regex must compile")
});
static REFERENCES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*REFERENCES\s+({IDENTIFIER})\s*\(([^()]*)\)"
    ))
    .expect("static regex must compile")
});
static REFERENCES_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*REFERENCES\b").expect("static regex must compile"));
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s+ON\s+(DELETE|UPDATE)\s+(SET\s+NULL|SET\s+DEFAULT|CASCADE|RESTRICT|NO\s+ACTION)",
    )
    .expect("static regex must compile")
});

/// Leading keywords of table-level constraints.
const CONSTRAINT_KEYWORDS: &[&str] = &["PRIMARY", "CHECK", "CONSTRAINT", "UNIQUE", "FOREIGN"];

/// Parses a full `CREATE TABLE` statement into a descriptor.
///
/// Newlines are flattened to spaces, then the text between the first `(`
/// and the last `)` is handed to [`split_columns_sql`].
///
/// # Errors
///
/// Returns [`ParseError`] for a missing column list, unbalanced parentheses,
/// unterminated quotes, or malformed foreign-key clauses.
///
/// # Examples
///
/// ```
/// use sew_core::parse_table_sql;
///
/// let desc = parse_table_sql(
///     "create table child(col1 INTEGER, col2,\n FOREIGN KEY(col2) REFERENCES parent(id))",
/// )
/// .unwrap();
///
/// assert_eq!(desc.column_names(), vec!["col1", "col2"]);
/// assert_eq!(desc.foreign_keys()[0].references(), "parent(id)");
/// ```
pub fn parse_table_sql(definition: &str) -> Result<TableDescriptor, ParseError> {
    let normalized = definition.replace(['\r', '\n'], " ");

    let start = normalized.find('(').ok_or(ParseError::MissingColumnList)?;
    let end = normalized
        .rfind(')')
        .filter(|&end| end > start)
        .ok_or(ParseError::UnbalancedParentheses)?;

    split_columns_sql(&normalized[start + 1..end])
}

/// Splits an extracted column-list body into columns, unique groups,
/// foreign keys and kept constraints.
///
/// # Errors
///
/// See [`parse_table_sql`].
pub fn split_columns_sql(body: &str) -> Result<TableDescriptor, ParseError> {
    let mut descriptor = TableDescriptor::default();

    for fragment in split_top_level(body)? {
        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !is_constraint_fragment(trimmed) {
            if let Some(column) = parse_column_desc(trimmed) {
                descriptor.columns.push(column);
            }
            continue;
        }

        let (name, clause) = match CONSTRAINT_NAME_RE.captures(trimmed) {
            Some(caps) => (Some(unquote(&caps[1])), caps.get(2).map_or("", |m| m.as_str())),
            None => (None, trimmed),
        };

        if let Some(unique) = parse_unique(clause) {
            descriptor.uniques.push(UniqueConstraint { name, ..unique });
        } else if let Some(caps) = FOREIGN_KEY_RE.captures(clause) {
            let fk = parse_foreign_key(&caps[1], &caps[2], trimmed)?;
            descriptor.foreign_keys.push(ForeignKeyDescriptor { name, ..fk });
        } else {
            debug!(constraint = trimmed, "Keeping table constraint verbatim");
            descriptor.constraints.push(trimmed.to_string());
        }
    }

    debug!(
        columns = descriptor.columns.len(),
        uniques = descriptor.uniques.len(),
        foreign_keys = descriptor.foreign_keys.len(),
        "Parsed table definition"
    );

    Ok(descriptor)
}

/// Parses one column fragment such as `col1 INTEGER PRIMARY KEY`.
///
/// The name ends at the first whitespace run (or at the closing quote of a
/// quoted name); everything after it is the raw type, trimmed.
/// Returns `None` for blank input.
pub fn parse_column_desc(desc: &str) -> Option<ColumnDescriptor> {
    let trimmed = desc.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (name, rest) = match quoted_prefix_len(trimmed) {
        Some(len) => (unquote(&trimmed[..len]), &trimmed[len..]),
        None => match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name.to_string(), rest),
            None => (trimmed.to_string(), ""),
        },
    };

    Some(ColumnDescriptor::new(name, rest))
}

/// `UNIQUE(a, b)` over plain column names. Anything richer (expressions,
/// collations, conflict clauses) is left for the verbatim path.
fn parse_unique(clause: &str) -> Option<UniqueConstraint> {
    let caps = UNIQUE_RE.captures(clause)?;
    identifier_list(&caps[1]).map(UniqueConstraint::new)
}

fn parse_foreign_key(
    child_list: &str,
    tail: &str,
    clause: &str,
) -> Result<ForeignKeyDescriptor, ParseError> {
    let child = single_identifier(child_list, clause)?;

    let Some(target) = REFERENCES_RE.captures(tail) else {
        return Err(if REFERENCES_WORD_RE.is_match(tail) {
            ParseError::MalformedReference(clause.to_string())
        } else {
            ParseError::MissingReferences(clause.to_string())
        });
    };
    let parent_column = single_identifier(&target[2], clause)?;
    let mut fk = ForeignKeyDescriptor::new(child, unquote(&target[1]), parent_column);

    let mut consumed = target.get(0).map_or(0, |m| m.end());
    while let Some(action) = ACTION_RE.captures(&tail[consumed..]) {
        let parsed = ForeignKeyAction::parse(&action[2]);
        if action[1].eq_ignore_ascii_case("DELETE") {
            fk.on_delete = parsed;
        } else {
            fk.on_update = parsed;
        }
        consumed += action.get(0).map_or(0, |m| m.end());
    }

    if !tail[consumed..].trim().is_empty() {
        return Err(ParseError::UnsupportedForeignKeyClause(clause.to_string()));
    }
    Ok(fk)
}

fn single_identifier(list: &str, clause: &str) -> Result<String, ParseError> {
    let mut names =
        identifier_list(list).ok_or_else(|| ParseError::MalformedReference(clause.to_string()))?;
    if names.len() != 1 {
        return Err(ParseError::CompositeForeignKey(clause.to_string()));
    }
    Ok(names.remove(0))
}

/// Splits a parenthesized name list, unquoting each entry.
///
/// Returns `None` if an entry is not a lone identifier.
fn identifier_list(list: &str) -> Option<Vec<String>> {
    let mut names = Vec::new();
    for item in split_top_level(list).ok()? {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let lone = match quoted_prefix_len(item) {
            Some(len) => len == item.len(),
            None => !item.contains(char::is_whitespace),
        };
        if !lone {
            return None;
        }
        names.push(unquote(item));
    }
    Some(names)
}

/// Splits on commas that sit outside parentheses and quotes.
///
/// A doubled quote inside a quoted run closes and reopens it, which leaves
/// the split unaffected.
pub(crate) fn split_top_level(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if let Some(open) = quote {
            if ch == closing_quote(open) {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' | '[' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ParseError::UnbalancedParentheses)?;
            }
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote);
    }
    if depth != 0 {
        return Err(ParseError::UnbalancedParentheses);
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn closing_quote(open: char) -> char {
    if open == '[' { ']' } else { open }
}

fn is_constraint_fragment(fragment: &str) -> bool {
    let first = fragment
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    CONSTRAINT_KEYWORDS
        .iter()
        .any(|kw| first.eq_ignore_ascii_case(kw))
}

/// Length of a leading quoted identifier, if the text starts with one.
///
/// Doubled quote characters inside the identifier are skipped over.
fn quoted_prefix_len(text: &str) -> Option<usize> {
    let open = text.chars().next()?;
    if !matches!(open, '"' | '`' | '[' | '\'') {
        return None;
    }
    let close = closing_quote(open);
    let bytes = text.as_bytes();
    let mut idx = 1;
    while let Some(pos) = text[idx..].find(close) {
        let at = idx + pos;
        if open != '[' && bytes.get(at + 1) == Some(&(close as u8)) {
            idx = at + 2;
            continue;
        }
        return Some(at + 1);
    }
    None
}

fn unquote(name: &str) -> String {
    let name = name.trim();
    let mut chars = name.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open @ ('"' | '`' | '\'')), Some(close)) if open == close && name.len() >= 2 => {
            let doubled: String = [open, open].iter().collect();
            name[1..name.len() - 1].replace(&doubled, &open.to_string())
        }
        (Some('['), Some(']')) => name[1..name.len() - 1].to_string(),
        _ => name.to_string(),
    }
}
