//! Output name templates.
//!
//! A template names segments with exactly one numeric placeholder of the
//! form `%N`, where `N` is the digit width (1-9): `piece-%3` renders index
//! 7 as `piece-007.wav`. Templates with zero or multiple placeholders are
//! rejected when the configuration is built, never silently rewritten.

use crate::SplitError;

/// Validated `index -> file name` template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameTemplate {
    prefix: String,
    width: usize,
    suffix: String,
}

impl NameTemplate {
    /// Parse a template string, requiring exactly one `%N` placeholder.
    pub fn parse(template: &str) -> Result<Self, SplitError> {
        let invalid = |reason| SplitError::InvalidTemplate {
            template: template.to_owned(),
            reason,
        };

        let Some(pos) = template.find('%') else {
            return Err(invalid("missing a '%N' segment-number placeholder"));
        };
        if template[pos + 1..].contains('%') {
            return Err(invalid("more than one '%' placeholder"));
        }
        let width = match template[pos + 1..].chars().next() {
            Some(digit @ '1'..='9') => digit as usize - '0' as usize,
            _ => return Err(invalid("placeholder width must be a digit from 1 to 9")),
        };

        Ok(Self {
            prefix: template[..pos].to_owned(),
            width,
            suffix: template[pos + 2..].to_owned(),
        })
    }

    /// Render the file name for a segment index. Indexes wider than the
    /// declared width widen the field rather than truncate.
    pub fn render(&self, index: u64) -> String {
        format!(
            "{}{:0width$}{}.wav",
            self.prefix,
            index,
            self.suffix,
            width = self.width
        )
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self {
            prefix: String::from("piece-"),
            width: 3,
            suffix: String::new(),
        }
    }
}
