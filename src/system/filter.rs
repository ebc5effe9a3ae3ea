use regex::Regex;
use tracing::warn;

use super::process::ProcessRecord;

/// Process filter text.
///
/// Plain text matches as a substring of the pid, or case-insensitively of the
/// name, command or user. Text starting with `!` is a regular expression
/// searched in the same fields.
#[derive(Clone, Debug, Default)]
pub enum ProcessFilter {
    #[default]
    Empty,
    Text {
        raw: String,
        lowered: String,
    },
    /// `None` when the expression failed to compile; such a filter matches
    /// nothing.
    Regex(Option<Regex>),
}

impl ProcessFilter {
    pub fn new(text: &str) -> Self {
        if text.is_empty() {
            return ProcessFilter::Empty;
        }
        if let Some(pattern) = text.strip_prefix('!')
            && !pattern.is_empty()
        {
            return match Regex::new(pattern) {
                Ok(re) => ProcessFilter::Regex(Some(re)),
                Err(err) => {
                    warn!(pattern, %err, "invalid process filter regex");
                    ProcessFilter::Regex(None)
                }
            };
        }
        ProcessFilter::Text {
            raw: text.to_string(),
            lowered: text.to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ProcessFilter::Empty)
    }

    pub fn matches(&self, record: &ProcessRecord) -> bool {
        match self {
            ProcessFilter::Empty => true,
            ProcessFilter::Text { raw, lowered } => {
                record.pid.to_string().contains(raw.as_str())
                    || contains_ignore_case(&record.name, lowered)
                    || contains_ignore_case(&record.command, lowered)
                    || contains_ignore_case(&record.user, lowered)
            }
            ProcessFilter::Regex(None) => false,
            ProcessFilter::Regex(Some(re)) => {
                re.is_match(&record.pid.to_string())
                    || re.is_match(&record.name)
                    || re.is_match(&record.command)
                    || re.is_match(&record.user)
            }
        }
    }
}

fn contains_ignore_case(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}
