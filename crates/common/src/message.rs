//! Staged message framing
//!
//! A staged notification is a plain file named after the recipient address:
//! the first line is `Subject: <subject>`, everything after it is the body.

use crate::error::{Error, Result};

/// Prefix of the first line of every staged file
pub const SUBJECT_PREFIX: &str = "Subject: ";

/// Collapse a subject onto one line, joining its trimmed lines with spaces
pub fn fold_subject(subject: &str) -> String {
    subject
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A rendered notification waiting in the outbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMessage {
    pub subject: String,
    pub body: String,
}

impl StagedMessage {
    /// Create a new message, folding any line breaks in the subject
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: fold_subject(&subject.into()),
            body: body.into(),
        }
    }

    /// Serialize into the on-disk framing
    pub fn to_framed(&self) -> String {
        format!("{}{}\n{}", SUBJECT_PREFIX, self.subject, self.body)
    }

    /// Parse the on-disk framing
    ///
    /// The subject is everything after the first `:` of the first line,
    /// minus one leading space.
    pub fn parse(contents: &str) -> Result<Self> {
        let (first_line, body) = contents.split_once('\n').unwrap_or((contents, ""));
        let first_line = first_line.trim_end_matches('\r');

        let (_, subject) = first_line.split_once(':').ok_or_else(|| {
            Error::MalformedMessage(format!("missing subject line: {:?}", first_line))
        })?;
        let subject = subject.strip_prefix(' ').unwrap_or(subject);

        Ok(Self {
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_layout() {
        let message = StagedMessage::new("Outage on Tuesday", "Dear user,\nhello\n");
        assert_eq!(
            message.to_framed(),
            "Subject: Outage on Tuesday\nDear user,\nhello\n"
        );
    }

    #[test]
    fn test_parse_keeps_colons_in_subject() {
        let message = StagedMessage::parse("Subject: Outage: zone qh2\nbody: text\n").unwrap();
        assert_eq!(message.subject, "Outage: zone qh2");
        assert_eq!(message.body, "body: text\n");
    }

    #[test]
    fn test_parse_rejects_missing_subject() {
        let result = StagedMessage::parse("no subject here\nbody");
        assert!(matches!(result, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn test_subject_line_breaks_are_folded() {
        let message = StagedMessage::new("Outage\nnext week", "");
        assert_eq!(message.subject, "Outage next week");
        assert_eq!(StagedMessage::parse(&message.to_framed()).unwrap(), message);
    }
}
