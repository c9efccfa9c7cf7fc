use serde::{Deserialize, Serialize};

/// Who an election is for. State and local elections carry their region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionScope {
    General,
    State { state: String },
    Local { state: String, city: String },
}

impl ElectionScope {
    /// Does a voter living in the given state and city fall within this scope?
    /// Region names are compared case-insensitively; a voter with no recorded
    /// region only sees general elections.
    pub fn includes(&self, state: Option<&str>, city: Option<&str>) -> bool {
        let same = |a: &str, b: Option<&str>| b.map_or(false, |b| a.eq_ignore_ascii_case(b.trim()));
        match self {
            Self::General => true,
            Self::State { state: s } => same(s, state),
            Self::Local { state: s, city: c } => same(s, state) && same(c, city),
        }
    }

    /// Reject scopes with blank region names.
    pub fn validate(&self) -> Result<(), String> {
        let blank = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(format!("`{field}` must not be blank"))
            } else {
                Ok(())
            }
        };
        match self {
            Self::General => Ok(()),
            Self::State { state } => blank("state", state),
            Self::Local { state, city } => blank("state", state).and(blank("city", city)),
        }
    }
}
