//! Composable SQL boolean conditions.
//!
//! A [`Condition`] is an immutable piece of `WHERE` text plus a flag telling
//! whether it contains a top-level `AND`/`OR`. Combining conditions wraps
//! exactly the composite operands in parentheses, so chained calls keep the
//! grouping they were written with:
//!
//! ```
//! use sew_core::Condition;
//!
//! let c = Condition::new("col1").lt(10)
//!     .or(Condition::new("col2").lt(10))
//!     .or("col3 < 10");
//! assert_eq!(c.as_str(), "(col1 < 10 OR col2 < 10) OR col3 < 10");
//!
//! let c = Condition::new("col1 < 10").or(Condition::new("col2 < 10").and("col3 < 10"));
//! assert_eq!(c.as_str(), "col1 < 10 OR (col2 < 10 AND col3 < 10)");
//! ```

use std::fmt;

/// An immutable SQL condition fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    text: String,
    composite: bool,
}

impl Condition {
    /// Wraps raw condition text, detecting top-level `AND`/`OR`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let composite = has_top_level_junction(&text);
        Self { text, composite }
    }

    /// The condition text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns `true` if the text has a top-level `AND` or `OR`.
    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// `self < value`
    pub fn lt(&self, value: impl fmt::Display) -> Self {
        self.compare("<", value)
    }

    /// `self <= value`
    pub fn le(&self, value: impl fmt::Display) -> Self {
        self.compare("<=", value)
    }

    /// `self > value`
    pub fn gt(&self, value: impl fmt::Display) -> Self {
        self.compare(">", value)
    }

    /// `self >= value`
    pub fn ge(&self, value: impl fmt::Display) -> Self {
        self.compare(">=", value)
    }

    /// `self = value`
    #[allow(clippy::should_implement_trait)]
    pub fn eq(&self, value: impl fmt::Display) -> Self {
        self.compare("=", value)
    }

    /// `self != value`
    #[allow(clippy::should_implement_trait)]
    pub fn ne(&self, value: impl fmt::Display) -> Self {
        self.compare("!=", value)
    }

    /// `self AND other`, bracketing composite operands.
    pub fn and(&self, other: impl Into<Condition>) -> Self {
        self.junction("AND", &other.into())
    }

    /// `self OR other`, bracketing composite operands.
    pub fn or(&self, other: impl Into<Condition>) -> Self {
        self.junction("OR", &other.into())
    }

    /// `self LIKE pattern`. The pattern is inserted as given, so string
    /// literals must carry their own quotes (or use a `?` placeholder).
    pub fn like(&self, pattern: impl fmt::Display) -> Self {
        Self::new(format!("{} LIKE {}", self.operand(), pattern))
    }

    /// `self IN (v1,v2,...)`
    pub fn in_list<I, T>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self::new(format!("{} IN ({})", self.operand(), joined))
    }

    /// `self IN (<subquery>)`
    pub fn in_subquery(&self, subquery: impl Into<Condition>) -> Self {
        Self::new(format!("{} IN ({})", self.operand(), subquery.into().text))
    }

    fn compare(&self, op: &str, value: impl fmt::Display) -> Self {
        Self::new(format!("{} {} {}", self.text, op, value))
    }

    fn junction(&self, keyword: &str, other: &Condition) -> Self {
        Self {
            text: format!("{} {} {}", self.operand(), keyword, other.operand()),
            composite: true,
        }
    }

    /// Text as it should appear inside a larger expression.
    fn operand(&self) -> String {
        if self.composite {
            format!("({})", self.text)
        } else {
            self.text.clone()
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Condition {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Condition {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&Condition> for Condition {
    fn from(condition: &Condition) -> Self {
        condition.clone()
    }
}

impl AsRef<str> for Condition {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Builds a ` where ...` clause joining `conditions` with `and`.
///
/// Returns an empty string when there are no conditions. With more than one
/// condition, composite ones are parenthesized.
pub fn where_clause(conditions: &[Condition]) -> String {
    match conditions {
        [] => String::new(),
        [single] => format!(" where {}", single.text),
        many => {
            let parts: Vec<String> = many.iter().map(Condition::operand).collect();
            format!(" where {}", parts.join(" and "))
        }
    }
}

/// Scans for a standalone `AND`/`OR` word outside parentheses and quotes.
fn has_top_level_junction(text: &str) -> bool {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut word = String::new();

    let is_junction = |word: &str| word.eq_ignore_ascii_case("AND") || word.eq_ignore_ascii_case("OR");

    for ch in text.chars() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
            continue;
        }
        if depth == 0 && is_junction(word.as_str()) {
            return true;
        }
        word.clear();
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth == 0 && is_junction(word.as_str())
}
