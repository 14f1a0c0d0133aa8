use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use sola_contracts::categories::{CategoryId, CATEGORIES};
use sola_contracts::events::EventWriter;
use sola_contracts::models::ModelRegistry;
use sola_contracts::pins::{Pin, PosterStyle, POSTER_FILTER_PRESETS};
use sola_engine::seed::seed_pins;
use sola_engine::{CycleError, Gallery, GenerationConfig, Studio};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "sola", version, about = "Sola moodboard generation driver")]
struct Cli {
    /// Append session events to this JSONL file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Use the offline dryrun provider regardless of the environment.
    #[arg(long, global = true)]
    dryrun: bool,
    /// Seed pins the gallery starts with.
    #[arg(long, global = true, default_value_t = 25)]
    seed_count: usize,
    /// Seed for gallery seeding and shuffling.
    #[arg(long, global = true)]
    rng_seed: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Vibe(VibeArgs),
    Poster(PosterArgs),
    Gallery(GalleryArgs),
    Models,
}

#[derive(Debug, Parser)]
struct VibeArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    category: CategoryId,
    #[arg(long)]
    count: Option<usize>,
    /// Image indices to keep, in pick order (e.g. `0,2`). Empty discards.
    #[arg(long, value_delimiter = ',')]
    select: Vec<usize>,
}

#[derive(Debug, Parser)]
struct PosterArgs {
    #[arg(long)]
    concept: String,
    #[arg(long, default_value = "swiss")]
    style: PosterStyle,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    subtitle: Option<String>,
    #[arg(long)]
    accent: Option<String>,
    #[arg(long)]
    text_color: Option<String>,
    /// Preset label or CSS filter expression.
    #[arg(long)]
    filter: Option<String>,
    #[arg(long)]
    title_size: Option<f64>,
}

#[derive(Debug, Parser)]
struct GalleryArgs {
    #[arg(long, default_value = "all")]
    category: CategoryId,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    shuffle: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sola error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    if let Command::Models = cli.command {
        print_json(&models_listing())?;
        return Ok(0);
    }

    let mut rng = match cli.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let config = if cli.dryrun {
        GenerationConfig::dryrun()
    } else {
        GenerationConfig::from_env()
    };
    let events = cli.events.as_ref().map(|path| {
        let session_id = format!("session-{}", session_tag(&mut rng));
        EventWriter::new(path, session_id)
    });
    let gallery = Gallery::new(seed_pins(cli.seed_count, &mut rng)?);
    let mut studio = Studio::from_config(config, gallery, events)?;

    match cli.command {
        Command::Vibe(args) => run_vibe(&mut studio, args),
        Command::Poster(args) => run_poster(&mut studio, args),
        Command::Gallery(args) => run_gallery(&mut studio, args, &mut rng),
        Command::Models => Ok(0),
    }
}

fn run_vibe(studio: &mut Studio, args: VibeArgs) -> Result<i32> {
    let generation = match studio.generate_vibe(&args.prompt, args.category, args.count) {
        Ok(generation) => generation,
        Err(err) => return report_cycle_error(&err),
    };
    info!(
        "{} image(s) ready for '{}'",
        generation.image_count, generation.refined_prompt
    );
    if args.select.is_empty() {
        studio.discard_vibe();
        print_json(&json!({
            "refined_prompt": generation.refined_prompt,
            "images": generation.image_count,
            "pins": [],
        }))?;
        return Ok(0);
    }
    for index in &args.select {
        if let Err(err) = studio.toggle_vibe(*index) {
            studio.discard_vibe();
            return report_cycle_error(&err);
        }
    }
    let pins = match studio.confirm_vibe() {
        Ok(pins) => pins,
        Err(err) => return report_cycle_error(&err),
    };
    print_json(&json!({
        "refined_prompt": generation.refined_prompt,
        "images": generation.image_count,
        "pins": pins_json(pins.iter())?,
        "active_category": studio.gallery().active_category(),
    }))?;
    Ok(0)
}

fn run_poster(studio: &mut Studio, args: PosterArgs) -> Result<i32> {
    let draft = match studio.draft_poster(&args.concept, args.style) {
        Ok(draft) => draft,
        Err(err) => return report_cycle_error(&err),
    };
    if let Some(title) = args.title {
        draft.set_title(title);
    }
    if let Some(subtitle) = args.subtitle {
        draft.set_subtitle(subtitle);
    }
    if let Some(filter) = args.filter.as_deref() {
        draft.set_filter(filter);
    }
    if let Some(size) = args.title_size {
        draft.set_title_size(size);
    }
    if let Some(accent) = args.accent.as_deref() {
        if let Err(err) = draft.set_accent_color(accent) {
            studio.reset_poster();
            return report_cycle_error(&CycleError::from(err));
        }
    }
    if let Some(text_color) = args.text_color.as_deref() {
        if let Err(err) = draft.set_text_color(text_color) {
            studio.reset_poster();
            return report_cycle_error(&CycleError::from(err));
        }
    }
    let pin = match studio.save_poster() {
        Ok(pin) => pin,
        Err(err) => return report_cycle_error(&err),
    };
    print_json(&json!({
        "pin": serde_json::to_value(&pin)?,
        "active_category": studio.gallery().active_category(),
    }))?;
    Ok(0)
}

fn run_gallery(studio: &mut Studio, args: GalleryArgs, rng: &mut StdRng) -> Result<i32> {
    if args.shuffle {
        studio.shuffle_with(rng);
    }
    let gallery = studio.gallery_mut();
    gallery.set_active_category(args.category);
    if let Some(query) = args.search {
        gallery.set_search_query(query);
    }
    let visible = gallery.visible();
    print_json(&json!({
        "category": gallery.active_category(),
        "search": gallery.search_query(),
        "total": gallery.len(),
        "visible": visible.len(),
        "pins": pins_json(visible.into_iter())?,
    }))?;
    Ok(0)
}

fn models_listing() -> Value {
    let models = ModelRegistry::new(None)
        .list()
        .map(|model| {
            json!({
                "name": model.name,
                "provider": model.provider,
                "capabilities": model.capabilities,
                "sized_output": model.sized_output,
            })
        })
        .collect::<Vec<_>>();
    let categories = CATEGORIES
        .iter()
        .map(|category| {
            json!({
                "id": category.id,
                "label": category.label,
                "prompt_helper": category.prompt_helper,
            })
        })
        .collect::<Vec<_>>();
    let styles = PosterStyle::ALL
        .iter()
        .map(|style| style.as_str())
        .collect::<Vec<_>>();
    let filters = POSTER_FILTER_PRESETS
        .iter()
        .map(|(label, expression)| json!({ "label": label, "filter": expression }))
        .collect::<Vec<_>>();
    json!({
        "models": models,
        "categories": categories,
        "poster_styles": styles,
        "poster_filters": filters,
    })
}

fn pins_json<'a>(pins: impl Iterator<Item = &'a Pin>) -> Result<Vec<Value>> {
    pins.map(|pin| serde_json::to_value(pin).context("pin serialization failed"))
        .collect()
}

fn report_cycle_error(err: &CycleError) -> Result<i32> {
    eprintln!("{}", err.user_message());
    Ok(2)
}

fn session_tag(rng: &mut StdRng) -> String {
    format!("{:08x}", rng.random::<u32>())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
