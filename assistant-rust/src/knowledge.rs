use crate::AssistantError;
use std::{io::ErrorKind, path::Path};

/// Text used in place of the knowledge base when none was supplied.
pub const NO_KNOWLEDGE_BASE: &str = "No knowledge base was provided.";

/// Reference text injected into every chat prompt.
///
/// Loaded once at startup and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBase {
    text: String,
    placeholder: bool,
}

impl KnowledgeBase {
    /// Read the knowledge base from `path`.
    ///
    /// A missing file is not an error: the placeholder text is used instead.
    /// Any other read failure is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssistantError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!(path = %path.display(), bytes = text.len(), "knowledge base loaded");
                Ok(Self::from_text(text))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "knowledge base not found, continuing without it"
                );
                Ok(Self::placeholder())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            placeholder: false,
        }
    }

    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            text: NO_KNOWLEDGE_BASE.to_string(),
            placeholder: true,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}
