//! Variable substitution for timeout and message text.
//!
//! - `${name}` looks up a scalar. Names match ignoring case, spaces and
//!   underscores, so `${Kw Timeout}` and `${kw_timeout}` are the same variable.
//! - `%{NAME}` reads an environment variable.
//! - A backslash escapes the next character: `\${x}` stays literal.

use std::collections::HashMap;
use std::env;

use timebox_types::{ConfigError, VariableResolver};

#[derive(Debug, Clone, Default)]
pub struct Variables {
    scalars: HashMap<String, String>,
}

impl Variables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar. `name` may be bare (`limit`) or decorated (`${limit}`).
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.scalars.insert(normalize(undecorate(name)), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.scalars
            .get(&normalize(undecorate(name)))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }

    fn lookup(&self, sigil: char, name: &str) -> Result<String, ConfigError> {
        let value = match sigil {
            '%' => env::var(name).ok(),
            _ => self.get(name).map(ToString::to_string),
        };
        value.ok_or_else(|| ConfigError::UnknownVariable(format!("{sigil}{{{name}}}")))
    }
}

impl<K, V> FromIterator<(K, V)> for Variables
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variables = Self::new();
        for (name, value) in iter {
            variables.set(name.as_ref(), value);
        }
        variables
    }
}

impl VariableResolver for Variables {
    fn replace_string(&self, text: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < text.len() {
            let rest = &text[i..];
            let Some(ch) = rest.chars().next() else {
                break;
            };

            if ch == '\\' {
                if let Some(escaped) = rest[1..].chars().next() {
                    out.push(escaped);
                    i += 1 + escaped.len_utf8();
                } else {
                    out.push(ch);
                    i += 1;
                }
                continue;
            }

            if (ch == '$' || ch == '%') && rest[1..].starts_with('{') {
                let Some(end_rel) = rest[2..].find('}') else {
                    return Err(ConfigError::UnclosedVariable(rest.to_string()));
                };
                let name = &rest[2..2 + end_rel];
                out.push_str(&self.lookup(ch, name)?);
                i += 2 + end_rel + 1;
                continue;
            }

            out.push(ch);
            i += ch.len_utf8();
        }

        Ok(out)
    }
}

fn undecorate(name: &str) -> &str {
    name.strip_prefix("${")
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(name)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
