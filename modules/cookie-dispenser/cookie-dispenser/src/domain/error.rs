use thiserror::Error;

/// Outcomes of a dispense call other than success.
#[derive(Error, Debug)]
pub enum DomainError {
    /// The quota was already empty. Nothing changes until a reset.
    #[error("We ran out of cookies!")]
    Exhausted,

    /// The name is on the blocked list. The unit taken for this call stays consumed.
    #[error("I'm sorry {name}, no cookies for you today.")]
    Rejected { name: String },

    #[error("failed to record cookie receipt: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl DomainError {
    #[must_use]
    pub fn rejected(name: impl Into<String>) -> Self {
        Self::Rejected { name: name.into() }
    }
}
