//! The unit of payload moved through the pipeline.

/// One opaque, self-contained serialized document.
///
/// The pipeline never looks inside a record; sinks decide how to ship it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Record(String);

impl Record {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Record {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Record {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Record {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered group of records flushed together.
pub type Batch = Vec<Record>;
