use std::fmt;

/// Kind of generation unit a request is issued for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Document outline (one per pipeline).
    Outline,
    /// One content section.
    Content,
    /// One rendered layout page.
    Layout,
}

impl UnitKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::Content => "content",
            Self::Layout => "layout",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic run behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    /// Bounded event buffer size used by the streaming channel.
    pub stream_buffer_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stream_buffer_capacity: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_default_buffer_capacity() {
        assert_eq!(RunOptions::default().stream_buffer_capacity, 128);
    }

    #[test]
    fn unit_kind_serializes_lowercase() {
        let json = serde_json::to_string(&UnitKind::Layout).unwrap();
        assert_eq!(json, "\"layout\"");
        assert_eq!(UnitKind::Outline.to_string(), "outline");
    }
}
