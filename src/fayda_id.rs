use crate::error::{Field, FieldError};

pub const FAYDA_ID_LEN: usize = 12;

pub(crate) const LENGTH_MESSAGE: &str = "Fayda ID must be exactly 12 digits";

/// Validates a Fayda ID (Fayda Identification Number) format.
///
/// A valid Fayda ID is:
/// - Exactly 12 characters
/// - All characters are ASCII digits
#[must_use]
pub fn is_valid_fayda_id(s: &str) -> bool {
    s.len() == FAYDA_ID_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Drops everything that is not an ASCII digit (spaces, dashes, pasted labels).
#[must_use]
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Feedback for the Fayda ID input while the operator is still typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFeedback {
    /// The value the input should now display.
    pub cleaned: String,
    /// `None` hides the field error.
    pub error: Option<FieldError>,
}

impl LiveFeedback {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.cleaned.is_empty()
    }
}

/// Cleans a raw input value and decides which inline error to show.
///
/// Empty input shows no error; anything else that is not 12 digits does.
#[must_use]
pub fn live_feedback(raw: &str) -> LiveFeedback {
    let cleaned = strip_non_digits(raw);
    let error = (!cleaned.is_empty() && cleaned.len() != FAYDA_ID_LEN)
        .then(|| FieldError::new(Field::FaydaId, LENGTH_MESSAGE));
    LiveFeedback { cleaned, error }
}

/// Masks all but the last four digits, for log output.
#[must_use]
pub fn mask(fayda_id: &str) -> String {
    let visible = fayda_id.len().saturating_sub(4);
    fayda_id
        .char_indices()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}
