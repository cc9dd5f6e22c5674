use serde::{Deserialize, Serialize};

/// Label the contact button shows while the recruiter can still be messaged.
pub const CONTACT_AVAILABLE_LABEL: &str = "Contact Now";

/// A job listing read from the currently displayed list.
///
/// `index` is the 1-based position at read time. It is not a stable identity:
/// the list can shift between reads. The contact label is read separately,
/// while the posting is evaluated; until then the posting is not eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub index: usize,
    pub description: String,
    pub contact_label: Option<String>,
    pub contact_eligible: bool,
}

impl JobPosting {
    pub fn new(index: usize, description: String) -> Self {
        Self {
            index,
            description,
            contact_label: None,
            contact_eligible: false,
        }
    }

    /// Records the contact button label and derives eligibility from it.
    pub fn with_contact_label(mut self, label: String) -> Self {
        self.contact_eligible = is_contact_available(&label);
        self.contact_label = Some(label);
        self
    }
}

/// Exact comparison after trimming surrounding whitespace.
pub fn is_contact_available(label: &str) -> bool {
    label.trim() == CONTACT_AVAILABLE_LABEL
}
