use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::categories::CategoryId;

/// Image reference carried by a pin: either an inline `data:` URI body or a
/// remote URL the engine cannot forward to an analysis model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImagePayload {
    Inline { mime_type: String, data: String },
    Remote(String),
}

impl ImagePayload {
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parses a `data:<mime>;base64,<body>` URI; anything else is remote.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix("data:") {
            if let Some((header, body)) = rest.split_once(',') {
                let mime_type = header
                    .split(';')
                    .next()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or("image/png");
                if header.ends_with(";base64") && !body.is_empty() {
                    return Self::inline(mime_type, body);
                }
            }
        }
        Self::Remote(trimmed.to_string())
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }

    pub fn to_uri(&self) -> String {
        match self {
            Self::Inline { mime_type, data } => format!("data:{mime_type};base64,{data}"),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl From<String> for ImagePayload {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ImagePayload> for String {
    fn from(value: ImagePayload) -> Self {
        value.to_uri()
    }
}

/// `#RRGGBB` colour, upper-case. `#RGB` input is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("#{r:02X}{g:02X}{b:02X}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for HexColor {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let raw = value.trim();
        let Some(body) = raw.strip_prefix('#') else {
            bail!("colour '{raw}' must start with '#'");
        };
        let expanded = if body.len() == 3 {
            body.chars().flat_map(|ch| [ch, ch]).collect::<String>()
        } else {
            body.to_string()
        };
        if expanded.len() != 6 || !expanded.chars().all(|ch| ch.is_ascii_hexdigit()) {
            bail!("colour '{raw}' is not a hex triple");
        }
        Ok(Self(format!("#{}", expanded.to_ascii_uppercase())))
    }
}

impl TryFrom<String> for HexColor {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterStyle {
    Swiss,
    Editorial,
    Brutalist,
    Vintage,
    Neon,
    Bauhaus,
}

impl PosterStyle {
    pub const ALL: [PosterStyle; 6] = [
        PosterStyle::Swiss,
        PosterStyle::Editorial,
        PosterStyle::Brutalist,
        PosterStyle::Vintage,
        PosterStyle::Neon,
        PosterStyle::Bauhaus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Swiss => "swiss",
            Self::Editorial => "editorial",
            Self::Brutalist => "brutalist",
            Self::Vintage => "vintage",
            Self::Neon => "neon",
            Self::Bauhaus => "bauhaus",
        }
    }
}

impl FromStr for PosterStyle {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("unknown poster style '{value}'"))
    }
}

/// Named CSS filter presets offered by the poster editor.
pub const POSTER_FILTER_PRESETS: [(&str, &str); 6] = [
    ("None", "none"),
    ("Noir", "grayscale(100%) contrast(120%)"),
    ("Sepia", "sepia(80%) contrast(90%)"),
    ("Muted", "saturate(60%) brightness(110%)"),
    ("Vivid", "saturate(150%) contrast(110%)"),
    ("Warm", "sepia(30%) saturate(140%)"),
];

pub const TITLE_SIZE_MIN: f64 = 0.5;
pub const TITLE_SIZE_MAX: f64 = 2.0;

/// Overlay descriptor of a poster pin. Every field is populated; a pin either
/// carries a complete `PosterData` or none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterData {
    pub style: PosterStyle,
    pub title: String,
    pub subtitle: String,
    pub accent_color: HexColor,
    pub overlay_text: bool,
    pub text_color: Option<HexColor>,
    pub filter: Option<String>,
    pub title_size: f64,
}

impl PosterData {
    pub fn clamp_title_size(value: f64) -> f64 {
        if !value.is_finite() {
            return 1.0;
        }
        value.clamp(TITLE_SIZE_MIN, TITLE_SIZE_MAX)
    }

    /// Resolves a preset label (`Noir`) or raw expression; `none` clears it.
    pub fn normalize_filter(value: &str) -> Option<String> {
        let trimmed = value.trim();
        let resolved = POSTER_FILTER_PRESETS
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(trimmed))
            .map(|(_, expression)| *expression)
            .unwrap_or(trimmed);
        if resolved.is_empty() || resolved.eq_ignore_ascii_case("none") {
            return None;
        }
        Some(resolved.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Generated,
    Seed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pin {
    id: String,
    image: ImagePayload,
    title: String,
    description: String,
    category: CategoryId,
    height_ratio: f64,
    provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poster: Option<PosterData>,
}

impl Pin {
    pub fn new(
        id: impl Into<String>,
        image: ImagePayload,
        title: impl Into<String>,
        description: impl Into<String>,
        category: CategoryId,
        height_ratio: f64,
        provenance: Provenance,
    ) -> Result<Self> {
        if !height_ratio.is_finite() || height_ratio <= 0.0 {
            bail!("pin height ratio must be positive, got {height_ratio}");
        }
        let id = id.into();
        if id.trim().is_empty() {
            bail!("pin id must not be empty");
        }
        Ok(Self {
            id,
            image,
            title: title.into(),
            description: description.into(),
            category,
            height_ratio,
            provenance,
            author: None,
            poster: None,
        })
    }

    /// `<kind>-<uuid v4>`; unique for the process lifetime.
    pub fn fresh_id(kind: &str) -> String {
        format!("{kind}-{}", uuid::Uuid::new_v4())
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_poster(mut self, poster: PosterData) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> &ImagePayload {
        &self.image
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> CategoryId {
        self.category
    }

    pub fn height_ratio(&self) -> f64 {
        self.height_ratio
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn poster(&self) -> Option<&PosterData> {
        self.poster.as_ref()
    }

    /// Case-insensitive substring match on title, description and poster title.
    pub fn matches_query(&self, query: &str) -> bool {
        if query.trim().is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self
                .poster
                .as_ref()
                .map(|poster| poster.title.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}
