//! Argument builder shared by the terraform command constructors.

use std::fmt::Display;

/// Defines how a flag and its value are rendered in command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagValueStyle {
    /// Render flag and value as separate arguments: `-flag value`.
    Separate,
    /// Render flag and value as a single argument with equals: `-flag=value`.
    Equals,
}

/// Builder for assembling command arguments consistently.
#[derive(Debug, Default)]
pub struct CommandArgsBuilder {
    args: Vec<String>,
}

impl CommandArgsBuilder {
    /// Create a builder whose first argument is the subcommand.
    pub fn subcommand(name: &str) -> Self {
        Self {
            args: vec![name.to_string()],
        }
    }

    /// Append a raw argument to the builder.
    pub fn push_arg<S: Into<String>>(&mut self, arg: S) {
        self.args.push(arg.into());
    }

    /// Append a flag with value if the value is not empty.
    pub fn push_flag_value(&mut self, flag: &str, value: &str, style: FlagValueStyle) {
        if value.is_empty() {
            return;
        }

        match style {
            FlagValueStyle::Separate => {
                self.args.push(flag.to_string());
                self.args.push(value.to_string());
            }
            FlagValueStyle::Equals => {
                self.args.push(format!("{}={}", flag, value));
            }
        }
    }

    /// Append a flag for each non-empty value in `values`.
    pub fn push_flag_values(&mut self, flag: &str, values: &[String], style: FlagValueStyle) {
        for value in values {
            self.push_flag_value(flag, value, style);
        }
    }

    /// Append `flag=value` only when an explicit value was configured.
    pub fn push_optional<T: Display>(&mut self, flag: &str, value: Option<T>) {
        if let Some(value) = value {
            self.args.push(format!("{}={}", flag, value));
        }
    }

    /// Append a bare flag when `enabled` is `Some(true)`.
    pub fn push_switch(&mut self, flag: &str, enabled: Option<bool>) {
        if enabled == Some(true) {
            self.args.push(flag.to_string());
        }
    }

    /// Return the collected arguments.
    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}
