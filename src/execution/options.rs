//! Spawn options.

use serde::{Deserialize, Serialize};

/// Options controlling how a command string becomes a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnOptions {
    /// Run the program directly instead of through the command interpreter.
    ///
    /// When set, the command string is split on whitespace into a program and
    /// its arguments. When cleared, the whole string is handed to
    /// `/bin/sh -c` (Unix) or `cmd /C` (Windows).
    pub bypass_shell: bool,
}

impl SpawnOptions {
    /// Options that run the command directly.
    pub fn direct() -> Self {
        Self { bypass_shell: true }
    }

    /// Options that run the command through the command interpreter.
    pub fn shell() -> Self {
        Self {
            bypass_shell: false,
        }
    }

    /// Set whether to bypass the command interpreter.
    pub fn bypass_shell(mut self, bypass: bool) -> Self {
        self.bypass_shell = bypass;
        self
    }
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self::direct()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bypasses_shell() {
        assert!(SpawnOptions::default().bypass_shell);
    }

    #[test]
    fn test_shell_options() {
        assert!(!SpawnOptions::shell().bypass_shell);
        assert!(SpawnOptions::shell().bypass_shell(true).bypass_shell);
    }

    #[test]
    fn test_deserialize_missing_field_uses_default() {
        let opts: SpawnOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.bypass_shell);

        let opts: SpawnOptions = serde_json::from_str(r#"{"bypass_shell": false}"#).unwrap();
        assert!(!opts.bypass_shell);
    }
}
