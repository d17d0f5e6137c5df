//! Interactive prompts for values that were neither supplied nor stored.

use dialoguer::{Input, Password};

use super::CredentialError;

/// Asks the user for a value.
pub trait Prompter: Send + Sync {
    /// Prompts with echoed input (usernames).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Prompt`] when the terminal cannot be read.
    fn prompt_plain(&self, label: &str) -> Result<String, CredentialError>;

    /// Prompts with masked input (passwords, exam numbers).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Prompt`] when the terminal cannot be read.
    fn prompt_secret(&self, label: &str) -> Result<String, CredentialError>;
}

/// Terminal prompts via `dialoguer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt_plain(&self, label: &str) -> Result<String, CredentialError> {
        let value: String = Input::new().with_prompt(label).interact_text()?;
        Ok(value.trim().to_string())
    }

    fn prompt_secret(&self, label: &str) -> Result<String, CredentialError> {
        Ok(Password::new().with_prompt(label).interact()?)
    }
}
