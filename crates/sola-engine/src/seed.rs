use anyhow::Result;
use rand::seq::IndexedRandom;
use rand::Rng;
use sola_contracts::categories::CategoryId;
use sola_contracts::pins::{ImagePayload, Pin, Provenance};

pub const SEED_AUTHOR: &str = "Sola Collective";
pub const SEED_IMAGE_WIDTH: u32 = 600;
pub const SEED_MIN_HEIGHT: u32 = 500;
pub const SEED_MAX_HEIGHT: u32 = 900;

pub const AESTHETIC_TITLES: [&str; 20] = [
    "Ethereal Silence",
    "Neon Dreamscape",
    "Velvet Horizon",
    "Concrete Poetry",
    "Liquid Time",
    "Silent Botanical",
    "Urban Solitude",
    "Desert Whisper",
    "Chrome Reflection",
    "Glass Garden",
    "Midnight Prism",
    "Solar Flare",
    "Rustic Echo",
    "Paper Memories",
    "Azure Void",
    "Lost Frequency",
    "Golden Hour",
    "Static Bloom",
    "Digital Haze",
    "Analog Soul",
];

pub const AESTHETIC_DESCRIPTIONS: [&str; 10] = [
    "A fleeting moment captured in digital amber.",
    "Where light meets shadow in perfect harmony.",
    "The quiet space between thoughts.",
    "Textures of reality, reimagined.",
    "A visual symphony of color and form.",
    "Nostalgia for a place never visited.",
    "Nature's chaotic geometry.",
    "The architecture of dreams.",
    "Soft whispers of a forgotten future.",
    "Echoes of light dancing on the surface.",
];

/// Curated starter pins on remote placeholder images, spread over the
/// non-wildcard palettes.
pub fn seed_pins<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Result<Vec<Pin>> {
    let palettes = CategoryId::palettes().collect::<Vec<_>>();
    let mut pins = Vec::with_capacity(count);
    for _ in 0..count {
        let height = rng.random_range(SEED_MIN_HEIGHT..=SEED_MAX_HEIGHT);
        let image_seed = format!("{:08x}", rng.random::<u32>());
        let title = AESTHETIC_TITLES.choose(rng).copied().unwrap_or("Untitled");
        let description = AESTHETIC_DESCRIPTIONS.choose(rng).copied().unwrap_or_default();
        let category = palettes.choose(rng).copied().unwrap_or(CategoryId::Minimal);
        let url = format!(
            "https://picsum.photos/seed/{image_seed}/{SEED_IMAGE_WIDTH}/{height}"
        );
        let pin = Pin::new(
            Pin::fresh_id("seed"),
            ImagePayload::Remote(url),
            title,
            description,
            category,
            f64::from(height) / f64::from(SEED_IMAGE_WIDTH),
            Provenance::Seed,
        )?
        .with_author(SEED_AUTHOR);
        pins.push(pin);
    }
    Ok(pins)
}
