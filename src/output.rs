//! # Output Configuration
//!
//! Decides whether the `template-clone` CLI decorates its reports with
//! colors and emoji. The `--color` flag is parsed into a [`ColorChoice`];
//! `auto` then consults the usual environment conventions before asking the
//! terminal:
//!
//! | Variable | Effect |
//! |---|---|
//! | `NO_COLOR` (any value) | off |
//! | `CLICOLOR=0` | off |
//! | `CLICOLOR_FORCE` (non-empty, not `0`) | on, even without a TTY |
//! | `TERM=dumb` | off |
//!
//! ```rust,ignore
//! use template_clone::output::{emoji, entity, ColorChoice, OutputConfig};
//!
//! let out = OutputConfig::new(ColorChoice::Auto);
//! println!("{} Cloned {}", emoji(&out, "✅", "[OK]"), entity(&out, &key));
//! ```

use std::fmt::{self, Display};
use std::str::FromStr;

use console::style;

/// Value of the `--color` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "invalid color choice '{}' (expected always, never or auto)",
                other
            )),
        }
    }
}

impl Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

/// Whether reports are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(choice: ColorChoice) -> Self {
        let use_color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => color_from_env(|name| {
                std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| console::Term::stdout().features().colors_supported()),
        };
        Self { use_color }
    }

    /// Plain text output, as used for pipes and tests.
    pub fn plain() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

/// Color decision imposed by the environment, if any.
fn color_from_env(var: impl Fn(&str) -> Option<String>) -> Option<bool> {
    if var("NO_COLOR").is_some() {
        return Some(false);
    }
    if var("CLICOLOR").is_some_and(|v| v == "0") {
        return Some(false);
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return Some(true);
    }
    if var("TERM").is_some_and(|v| v == "dumb") {
        return Some(false);
    }
    None
}

/// The emoji when colors are on, the bracketed label otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// An entity key, highlighted when colors are on.
pub fn entity(config: &OutputConfig, key: &impl Display) -> String {
    if config.use_color {
        style(key).cyan().bold().force_styling(true).to_string()
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EntityKey;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_explicit_choices() {
        assert!(OutputConfig::new(ColorChoice::Always).use_color);
        assert!(!OutputConfig::new(ColorChoice::Never).use_color);
    }

    #[test]
    fn test_parse_color_choice() {
        assert_eq!("ALWAYS".parse::<ColorChoice>(), Ok(ColorChoice::Always));
        assert_eq!("never".parse::<ColorChoice>(), Ok(ColorChoice::Never));
        assert!("sometimes".parse::<ColorChoice>().is_err());
        assert_eq!(ColorChoice::default().to_string(), "auto");
    }

    #[test]
    fn test_environment_rules() {
        assert_eq!(color_from_env(env(&[("NO_COLOR", "")])), Some(false));
        assert_eq!(
            color_from_env(env(&[("NO_COLOR", "1"), ("CLICOLOR_FORCE", "1")])),
            Some(false)
        );
        assert_eq!(color_from_env(env(&[("CLICOLOR", "0")])), Some(false));
        assert_eq!(color_from_env(env(&[("CLICOLOR_FORCE", "1")])), Some(true));
        assert_eq!(color_from_env(env(&[("CLICOLOR_FORCE", "0")])), None);
        assert_eq!(color_from_env(env(&[("TERM", "dumb")])), Some(false));
        assert_eq!(color_from_env(env(&[("TERM", "xterm-256color")])), None);
    }

    #[test]
    fn test_emoji_helper() {
        let styled = OutputConfig::new(ColorChoice::Always);
        assert_eq!(emoji(&styled, "✅", "[OK]"), "✅");
        assert_eq!(emoji(&OutputConfig::plain(), "✅", "[OK]"), "[OK]");
    }

    #[test]
    fn test_entity_rendering() {
        let key = EntityKey::new("Task", "t1");
        assert_eq!(entity(&OutputConfig::plain(), &key), "Task/t1");

        let rendered = entity(&OutputConfig::new(ColorChoice::Always), &key);
        assert!(rendered.contains("Task/t1"));
        assert!(rendered.contains('\u{1b}'));
    }
}
