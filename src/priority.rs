use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket priority as reported by the DeskFlow backend
/// Ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    /// "Baja"
    Low = 1,
    /// "Media"
    Medium = 2,
    /// "Alta"
    High = 3,
    /// "Urgente"
    Urgent = 4,
}

impl Priority {
    /// Parse the backend vocabulary. Anything outside it is rejected rather than guessed.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "Baja" => Some(Priority::Low),
            "Media" => Some(Priority::Medium),
            "Alta" => Some(Priority::High),
            "Urgente" => Some(Priority::Urgent),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Priority::Low => "Baja",
            Priority::Medium => "Media",
            Priority::High => "Alta",
            Priority::Urgent => "Urgente",
        }
    }

    /// Get the numeric priority value
    pub fn value(self) -> u32 {
        self as u32
    }
}

impl TryFrom<String> for Priority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Priority::from_wire(&value).ok_or_else(|| format!("unknown ticket priority '{value}'"))
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_wire().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Urgent => "URGENT",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_wire() {
        assert_eq!(Priority::from_wire("Urgente"), Some(Priority::Urgent));
        assert_eq!(Priority::from_wire("Alta"), Some(Priority::High));
        assert_eq!(Priority::from_wire("Media"), Some(Priority::Medium));
        assert_eq!(Priority::from_wire("Baja"), Some(Priority::Low));

        // No guessing for legacy or English labels
        assert_eq!(Priority::from_wire("High"), None);
        assert_eq!(Priority::from_wire("alta"), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::Urgent.value(), 4);
    }

    #[test]
    fn test_priority_serde_uses_backend_vocabulary() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"Alta\"");

        let parsed: Priority = serde_json::from_str("\"Media\"").unwrap();
        assert_eq!(parsed, Priority::Medium);

        let err = serde_json::from_str::<Priority>("\"In Progress\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(format!("{}", Priority::Urgent), "URGENT");
        assert_eq!(format!("{}", Priority::Low), "LOW");
    }
}
