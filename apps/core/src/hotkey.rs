use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// Hotkey given to whichever action ends up as a result's default.
pub const DEFAULT_ACTION_HOTKEY: &str = "Enter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Cmd,
    Alt,
    Shift,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ctrl => "Ctrl",
            Self::Cmd => "Cmd",
            Self::Alt => "Alt",
            Self::Shift => "Shift",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    #[error("empty hotkey")]
    Empty,
    #[error("unsupported modifier '{0}'")]
    UnknownModifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    pub modifiers: BTreeSet<Modifier>,
    pub key: String,
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{modifier}+")?;
        }
        f.write_str(&self.key)
    }
}

pub fn parse_hotkey(input: &str) -> Result<Hotkey, HotkeyError> {
    let parts: Vec<&str> = input
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    let Some((key, modifiers)) = parts.split_last() else {
        return Err(HotkeyError::Empty);
    };

    Ok(Hotkey {
        modifiers: modifiers
            .iter()
            .map(|part| parse_modifier(part))
            .collect::<Result<_, _>>()?,
        key: normalize_key(key),
    })
}

/// Rewrites a provider-declared shortcut for the running platform: Ctrl
/// becomes Cmd on macOS and Cmd becomes Ctrl elsewhere.
pub fn normalize_hotkey(input: &str, platform: Platform) -> Result<String, HotkeyError> {
    let mut hotkey = parse_hotkey(input)?;
    hotkey.modifiers = hotkey
        .modifiers
        .into_iter()
        .map(|modifier| match (platform, modifier) {
            (Platform::MacOs, Modifier::Ctrl) => Modifier::Cmd,
            (Platform::Windows | Platform::Linux, Modifier::Cmd) => Modifier::Ctrl,
            (_, other) => other,
        })
        .collect();
    Ok(hotkey.to_string())
}

fn parse_modifier(input: &str) -> Result<Modifier, HotkeyError> {
    match input.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Ok(Modifier::Ctrl),
        "cmd" | "command" | "meta" | "super" | "win" => Ok(Modifier::Cmd),
        "alt" | "option" | "opt" => Ok(Modifier::Alt),
        "shift" => Ok(Modifier::Shift),
        _ => Err(HotkeyError::UnknownModifier(input.to_string())),
    }
}

fn normalize_key(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) if input.chars().count() == 1 => first.to_uppercase().collect(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
