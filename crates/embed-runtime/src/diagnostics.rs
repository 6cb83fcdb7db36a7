//! Diagnostic aggregation.
//!
//! Setup steps can report any number of messages. They are collected into a
//! [`Diagnostics`] value and flattened into a single owned string when they
//! reach the caller.

use std::fmt;

/// Join messages in order, separated by a single newline.
///
/// Empty input yields an empty string. There is never a trailing newline.
pub fn join<I, S>(messages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for (i, message) in messages.into_iter().enumerate() {
        if i > 0 {
            joined.push('\n');
        }
        joined.push_str(message.as_ref());
    }
    joined
}

/// Ordered collection of diagnostic messages produced by a failed step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single-message failure.
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    /// Flatten into one newline-joined message.
    pub fn join(&self) -> String {
        join(&self.messages)
    }

    /// `Ok(value)` when nothing was collected, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

impl From<Vec<String>> for Diagnostics {
    fn from(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

impl<S: Into<String>> FromIterator<S> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            messages: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for Diagnostics {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.messages.extend(iter.into_iter().map(Into::into));
    }
}
