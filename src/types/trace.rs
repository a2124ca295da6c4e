use std::fmt;

/// One step of a trace path.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum TraceSegment {
    /// A statically known structure key, rendered as `["key"]`.
    Field(String),
    /// A statically known array position, rendered as `[3]`.
    Index(usize),
    /// The running index of the element loop bound to `slot`, plus `offset`.
    Element { slot: usize, offset: usize },
    /// The current key of the key loop bound to `slot`.
    Key { slot: usize },
}

/// The location of the value under test, relative to the trace prefix.
///
/// Built by concatenation while the compiler descends into sub-values; loop
/// segments are filled in at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TracePath {
    segments: Vec<TraceSegment>,
}

impl TracePath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: TraceSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[TraceSegment] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Quote a key the way it appears inside a trace path.
pub(crate) fn quote_key(key: &str) -> String {
    serde_json::Value::String(key.to_owned()).to_string()
}

impl fmt::Display for TracePath {
    /// Renders the path as a template: loop segments print as placeholders.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                TraceSegment::Field(key) => write!(f, "[{}]", quote_key(key))?,
                TraceSegment::Index(i) => write!(f, "[{i}]")?,
                TraceSegment::Element { slot, offset: 0 } => write!(f, "[${{i{slot}}}]")?,
                TraceSegment::Element { slot, offset } => {
                    write!(f, "[${{i{slot} + {offset}}}]")?;
                }
                TraceSegment::Key { slot } => write!(f, "[${{JSON.stringify(k{slot})}}]")?,
            }
        }
        Ok(())
    }
}
