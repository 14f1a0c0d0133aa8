use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Gallery palette. `All` is the wildcard: as a filter it keeps every pin, as
/// a pin category it matches every filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryId {
    All,
    Botanica,
    Nomad,
    Atelier,
    Nostalgia,
    Minimal,
    Mirage,
}

impl CategoryId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Botanica => "botanica",
            Self::Nomad => "nomad",
            Self::Atelier => "atelier",
            Self::Nostalgia => "nostalgia",
            Self::Minimal => "minimal",
            Self::Mirage => "mirage",
        }
    }

    pub fn is_wildcard(self) -> bool {
        self == Self::All
    }

    pub fn category(self) -> &'static Category {
        CATEGORIES
            .iter()
            .find(|category| category.id == self)
            .unwrap_or(&CATEGORIES[0])
    }

    /// Non-wildcard categories, in catalog order.
    pub fn palettes() -> impl Iterator<Item = CategoryId> {
        CATEGORIES
            .iter()
            .map(|category| category.id)
            .filter(|id| !id.is_wildcard())
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryId {
    type Err = anyhow::Error;

    /// Accepts ids (`nomad`) and labels (`Nomad`).
    fn from_str(value: &str) -> anyhow::Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        CATEGORIES
            .iter()
            .find(|category| {
                category.id.as_str() == normalized
                    || category.label.to_ascii_lowercase() == normalized
            })
            .map(|category| category.id)
            .ok_or_else(|| anyhow::anyhow!("unknown category '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub background: &'static str,
    pub text: &'static str,
    pub accent: &'static str,
    pub secondary: &'static str,
    pub hero_gradient_primary: &'static str,
    pub hero_gradient_secondary: &'static str,
    pub title_font: &'static str,
    /// CSS declarations applied to the hero title.
    pub title_style: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub label: &'static str,
    pub prompt_helper: &'static str,
    pub theme: Theme,
}

pub const CATEGORIES: [Category; 7] = [
    Category {
        id: CategoryId::All,
        label: "All",
        prompt_helper: "aesthetic mixed media",
        theme: Theme {
            background: "#F5F5DC",
            text: "#A0522D",
            accent: "#E35336",
            secondary: "#F4A460",
            hero_gradient_primary: "bg-terra/10",
            hero_gradient_secondary: "bg-sand/20",
            title_font: "font-display",
            title_style: &[("letter-spacing", "-0.05em")],
        },
    },
    Category {
        id: CategoryId::Botanica,
        label: "Botanica",
        prompt_helper: "lush exotic plants, greenhouse, sunbeams, macro texture, organic",
        theme: Theme {
            background: "#F1F8F4",
            text: "#1B4D3E",
            accent: "#4A7C59",
            secondary: "#A8C6B3",
            hero_gradient_primary: "bg-emerald-500/10",
            hero_gradient_secondary: "bg-green-300/20",
            title_font: "font-serif",
            title_style: &[("font-style", "italic"), ("font-weight", "400")],
        },
    },
    Category {
        id: CategoryId::Nomad,
        label: "Nomad",
        prompt_helper: "desert dunes, moroccan architecture, warm sunset, travel photography",
        theme: Theme {
            background: "#FFF8F0",
            text: "#8B4513",
            accent: "#D2691E",
            secondary: "#DEB887",
            hero_gradient_primary: "bg-orange-500/10",
            hero_gradient_secondary: "bg-yellow-500/10",
            title_font: "font-display",
            title_style: &[("letter-spacing", "0.1em"), ("text-transform", "uppercase")],
        },
    },
    Category {
        id: CategoryId::Atelier,
        label: "Atelier",
        prompt_helper: "art studio, oil painting texture, cluttered creative space, warm lighting",
        theme: Theme {
            background: "#F5F5F7",
            text: "#1A1A1A",
            accent: "#3B82F6",
            secondary: "#94A3B8",
            hero_gradient_primary: "bg-blue-500/10",
            hero_gradient_secondary: "bg-slate-400/10",
            title_font: "font-sans",
            title_style: &[("font-weight", "800"), ("letter-spacing", "-0.08em")],
        },
    },
    Category {
        id: CategoryId::Nostalgia,
        label: "Nostalgia",
        prompt_helper: "vintage film grain, 90s aesthetic, polaroid style, muted colors",
        theme: Theme {
            background: "#FFFDF5",
            text: "#9F1239",
            accent: "#B45309",
            secondary: "#FCD34D",
            hero_gradient_primary: "bg-rose-500/10",
            hero_gradient_secondary: "bg-amber-500/10",
            title_font: "font-serif",
            title_style: &[("letter-spacing", "0.05em"), ("font-weight", "300")],
        },
    },
    Category {
        id: CategoryId::Minimal,
        label: "Minimal",
        prompt_helper: "beige aesthetics, shadows on wall, clean lines, architectural",
        theme: Theme {
            background: "#FAFAFA",
            text: "#262626",
            accent: "#525252",
            secondary: "#D4D4D4",
            hero_gradient_primary: "bg-gray-900/5",
            hero_gradient_secondary: "bg-gray-400/10",
            title_font: "font-sans",
            title_style: &[("font-weight", "300"), ("letter-spacing", "0.2em")],
        },
    },
    Category {
        id: CategoryId::Mirage,
        label: "Mirage",
        prompt_helper: "surreal collage, dreamscape, floating islands, clouds, pastel",
        theme: Theme {
            background: "#FDFAFF",
            text: "#5B21B6",
            accent: "#8B5CF6",
            secondary: "#C4B5FD",
            hero_gradient_primary: "bg-violet-500/10",
            hero_gradient_secondary: "bg-fuchsia-400/10",
            title_font: "font-display",
            title_style: &[("filter", "blur(1px)"), ("letter-spacing", "0.05em")],
        },
    },
];

/// Prompt helper for a category label or id, if it names a catalog entry.
pub fn prompt_helper_for(label: &str) -> Option<&'static str> {
    label
        .parse::<CategoryId>()
        .ok()
        .map(|id| id.category().prompt_helper)
}
