use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sola_contracts::pins::ImagePayload;

use super::{GenerativeProvider, ImageRequest, TextRequest, VisionRequest};

const DRYRUN_IMAGE_SIDE: u32 = 64;

/// Offline provider producing deterministic text and flat-colour PNGs.
pub struct DryrunProvider;

impl GenerativeProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn complete_text(&self, request: &TextRequest) -> Result<String> {
        match request.response_schema.as_ref() {
            Some(schema) => Ok(schema_reply(schema, &request.prompt)),
            None => Ok(format!(
                "{}, soft light, film grain",
                first_words(&request.prompt, 12)
            )),
        }
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>> {
        let (r, g, b) = color_from_prompt(&request.prompt, request.index as u64);
        let mut image = RgbImage::new(DRYRUN_IMAGE_SIDE, DRYRUN_IMAGE_SIDE);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("dryrun png encode failed")?;
        Ok(Some(ImagePayload::inline("image/png", BASE64.encode(bytes))))
    }

    fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        let seed = format!("{}{}", request.data, request.instruction);
        match request.response_schema.as_ref() {
            Some(schema) => Ok(schema_reply(schema, &seed)),
            None => Ok(format!("Image {}", short_id(&seed, 0))),
        }
    }
}

/// Fills every schema property with a value derived from `seed`.
fn schema_reply(schema: &Value, seed: &str) -> String {
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut reply = Map::new();
    for (idx, key) in properties.keys().enumerate() {
        let value = if key.to_ascii_lowercase().ends_with("color") {
            let (r, g, b) = color_from_prompt(seed, idx as u64);
            format!("#{}", hex::encode_upper([r, g, b]))
        } else {
            format!("Dryrun {key} {}", short_id(seed, idx as u64))
        };
        reply.insert(key.clone(), Value::String(value));
    }
    Value::Object(reply).to_string()
}

fn first_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<&str>>()
        .join(" ")
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str, idx: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(idx.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
