use serde::{Deserialize, Serialize};

/// Processing status of a keyword row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeywordStatus {
    Pending,
    Processing,
    Done,
    Error { note: String },
}

impl KeywordStatus {
    /// Label written to the keyword partition.
    pub fn label(&self) -> String {
        match self {
            KeywordStatus::Pending => "pending".to_string(),
            KeywordStatus::Processing => "processing".to_string(),
            KeywordStatus::Done => "done".to_string(),
            KeywordStatus::Error { note } => format!("error: {}", note),
        }
    }

    /// Parse a status label. Empty and unknown labels read as `Pending`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        let lower = label.to_lowercase();
        match lower.as_str() {
            "processing" => KeywordStatus::Processing,
            "done" => KeywordStatus::Done,
            _ if lower.starts_with("error") => KeywordStatus::Error {
                note: label
                    .get("error".len()..)
                    .unwrap_or("")
                    .trim_start_matches(':')
                    .trim()
                    .to_string(),
            },
            _ => KeywordStatus::Pending,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, KeywordStatus::Done)
    }
}

/// A keyword row from the external keyword partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    /// Row index within the keyword partition.
    pub row: usize,
    pub status: KeywordStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for status in [
            KeywordStatus::Pending,
            KeywordStatus::Processing,
            KeywordStatus::Done,
            KeywordStatus::Error {
                note: "upstream timeout".to_string(),
            },
        ] {
            assert_eq!(KeywordStatus::from_label(&status.label()), status);
        }
    }

    #[test]
    fn test_from_label_lenient() {
        assert_eq!(KeywordStatus::from_label(""), KeywordStatus::Pending);
        assert_eq!(KeywordStatus::from_label(" DONE "), KeywordStatus::Done);
        assert_eq!(KeywordStatus::from_label("whatever"), KeywordStatus::Pending);
        assert_eq!(
            KeywordStatus::from_label("Error"),
            KeywordStatus::Error {
                note: String::new()
            }
        );
    }
}
