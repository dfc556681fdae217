//! Productivity categories for applications.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of productivity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Productive,
    Social,
    Entertainment,
    Uncategorized,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Self; 4] = [
        Self::Productive,
        Self::Social,
        Self::Entertainment,
        Self::Uncategorized,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Productive => "productive",
            Self::Social => "social",
            Self::Entertainment => "entertainment",
            Self::Uncategorized => "uncategorized",
        }
    }

    /// Human-readable label for reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Productive => "Productive",
            Self::Social => "Social/Communication",
            Self::Entertainment => "Entertainment",
            Self::Uncategorized => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "productive" => Ok(Self::Productive),
            "social" => Ok(Self::Social),
            "entertainment" => Ok(Self::Entertainment),
            "uncategorized" => Ok(Self::Uncategorized),
            _ => Err(format!("invalid category: {s}")),
        }
    }
}

/// Static mapping from application names to categories.
///
/// Patterns are case-insensitive. A pattern matches an app name when it is
/// contained in it (so an exact name always matches); a pattern containing `*`
/// is matched as a wildcard. Lists are checked in the order productive,
/// social, entertainment and the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    #[serde(default)]
    pub productive: Vec<String>,
    #[serde(default)]
    pub social: Vec<String>,
    #[serde(default)]
    pub entertainment: Vec<String>,
}

const DEFAULT_PRODUCTIVE: &[&str] = &[
    "code", "vim", "emacs", "gedit", "kate", "atom", "sublime_text", "sublime text", "pycharm",
    "intellij", "eclipse", "devenv", "notepad++", "git.exe", "nano", "xcode", "terminal",
    "libreoffice", "writer", "calc", "impress", "pages", "numbers", "keynote", "microsoft word",
    "microsoft excel", "microsoft powerpoint", "winword", "excel", "powerpnt", "gimp",
    "inkscape", "blender", "figma", "sketch",
];

const DEFAULT_SOCIAL: &[&str] = &[
    "chrome", "chromium", "firefox", "safari", "discord", "telegram", "slack", "thunderbird",
    "evolution", "pidgin", "signal", "whatsapp", "teams", "zoom", "messages", "mail",
];

const DEFAULT_ENTERTAINMENT: &[&str] = &[
    "spotify", "vlc", "netflix", "youtube", "steam", "epicgameslauncher", "lutris",
    "minecraft", "rhythmbox", "totem", "audacity", "kodi", "mpv", "clementine", "quicktime",
    "music",
];

impl Default for CategoryMap {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(ToString::to_string).collect();
        Self {
            productive: owned(DEFAULT_PRODUCTIVE),
            social: owned(DEFAULT_SOCIAL),
            entertainment: owned(DEFAULT_ENTERTAINMENT),
        }
    }
}

impl CategoryMap {
    /// A mapping with no patterns; everything is uncategorized.
    pub const fn empty() -> Self {
        Self {
            productive: Vec::new(),
            social: Vec::new(),
            entertainment: Vec::new(),
        }
    }

    /// Categorizes an application name.
    pub fn categorize(&self, app_name: &str) -> Category {
        let lists = [
            (Category::Productive, &self.productive),
            (Category::Social, &self.social),
            (Category::Entertainment, &self.entertainment),
        ];

        lists
            .into_iter()
            .find(|(_, patterns)| patterns.iter().any(|p| pattern_matches(p, app_name)))
            .map_or(Category::Uncategorized, |(category, _)| category)
    }
}

fn pattern_matches(pattern: &str, text: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    let text = text.to_lowercase();

    if !pattern.contains('*') {
        return text.contains(&pattern);
    }

    let mut pos = 0;
    for part in pattern.split('*').filter(|p| !p.is_empty()) {
        match text[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }
    true
}
