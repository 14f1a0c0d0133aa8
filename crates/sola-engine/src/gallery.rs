use rand::seq::SliceRandom;
use rand::Rng;
use sola_contracts::categories::CategoryId;
use sola_contracts::pins::Pin;

/// Whether a pin tagged `pin_category` shows under the `active` filter.
/// The wildcard matches on either side.
pub fn category_matches(pin_category: CategoryId, active: CategoryId) -> bool {
    active.is_wildcard() || pin_category.is_wildcard() || pin_category == active
}

/// In-memory pin list, most recent first, plus the presentation filter.
#[derive(Debug, Clone)]
pub struct Gallery {
    pins: Vec<Pin>,
    active_category: CategoryId,
    search_query: String,
}

impl Default for Gallery {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Gallery {
    pub fn new(pins: Vec<Pin>) -> Self {
        Self {
            pins,
            active_category: CategoryId::All,
            search_query: String::new(),
        }
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn active_category(&self) -> CategoryId {
        self.active_category
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Prepends a batch, keeping its internal order. No dedup.
    pub fn add_pins(&mut self, new_pins: Vec<Pin>) {
        if new_pins.is_empty() {
            return;
        }
        self.pins.splice(0..0, new_pins);
    }

    pub fn filtered_view(&self, active: CategoryId, query: &str) -> Vec<&Pin> {
        let blank = query.trim().is_empty();
        self.pins
            .iter()
            .filter(|pin| category_matches(pin.category(), active))
            .filter(|pin| blank || pin.matches_query(query))
            .collect()
    }

    pub fn visible(&self) -> Vec<&Pin> {
        self.filtered_view(self.active_category, &self.search_query)
    }

    /// Switching palettes clears the search box.
    pub fn set_active_category(&mut self, category: CategoryId) {
        self.active_category = category;
        self.search_query.clear();
    }

    /// Moves the palette filter and keeps whatever is in the search box.
    pub fn focus_category(&mut self, category: CategoryId) {
        self.active_category = category;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.pins.shuffle(rng);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sola_contracts::pins::{HexColor, ImagePayload, PosterData, PosterStyle, Provenance};

    use super::*;

    fn pin(id: &str, title: &str, category: CategoryId) -> Pin {
        Pin::new(
            id,
            ImagePayload::Remote(format!("https://picsum.photos/seed/{id}/600/800")),
            title,
            "Where light meets shadow in perfect harmony.",
            category,
            1.0,
            Provenance::Seed,
        )
        .unwrap()
    }

    fn ids(pins: &[&Pin]) -> Vec<String> {
        pins.iter().map(|pin| pin.id().to_string()).collect()
    }

    #[test]
    fn new_batches_are_prepended_in_order() {
        let mut gallery = Gallery::new(vec![pin("old", "Azure Void", CategoryId::Minimal)]);
        gallery.add_pins(vec![
            pin("a", "Glass Garden", CategoryId::Botanica),
            pin("b", "Solar Flare", CategoryId::Mirage),
        ]);
        gallery.add_pins(vec![pin("a", "Glass Garden", CategoryId::Botanica)]);
        let order = gallery.pins().iter().map(Pin::id).collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "a", "b", "old"]);
    }

    #[test]
    fn category_filter_honours_wildcard_on_both_sides() {
        let gallery = Gallery::new(vec![
            pin("a", "Glass Garden", CategoryId::Botanica),
            pin("b", "Desert Whisper", CategoryId::Nomad),
            pin("w", "Analog Soul", CategoryId::All),
        ]);
        assert_eq!(
            ids(&gallery.filtered_view(CategoryId::Botanica, "")),
            vec!["a", "w"]
        );
        assert_eq!(ids(&gallery.filtered_view(CategoryId::Nomad, "")), vec!["b", "w"]);
        assert_eq!(
            ids(&gallery.filtered_view(CategoryId::All, "")),
            vec!["a", "b", "w"]
        );
        assert_eq!(ids(&gallery.filtered_view(CategoryId::Atelier, "")), vec!["w"]);
    }

    #[test]
    fn blank_query_leaves_view_unchanged() {
        let gallery = Gallery::new(vec![
            pin("a", "Glass Garden", CategoryId::Botanica),
            pin("b", "Desert Whisper", CategoryId::Nomad),
        ]);
        let baseline = ids(&gallery.filtered_view(CategoryId::All, ""));
        for query in ["   ", "\t", "\n "] {
            assert_eq!(ids(&gallery.filtered_view(CategoryId::All, query)), baseline);
        }
    }

    #[test]
    fn query_matches_title_description_and_poster_title() -> anyhow::Result<()> {
        let poster = Pin::new(
            "poster",
            ImagePayload::inline("image/png", "AAAA"),
            "Untitled",
            "Sola Art Lab Original",
            CategoryId::Atelier,
            1.2,
            Provenance::Generated,
        )?
        .with_poster(PosterData {
            style: PosterStyle::Swiss,
            title: "BEACON".to_string(),
            subtitle: "alone in the fog".to_string(),
            accent_color: HexColor::rgb(0x11, 0x22, 0x33),
            overlay_text: true,
            text_color: None,
            filter: None,
            title_size: 1.0,
        });
        let gallery = Gallery::new(vec![
            pin("a", "Glass Garden", CategoryId::Botanica),
            pin("b", "Desert Whisper", CategoryId::Nomad),
            poster,
        ]);
        assert_eq!(ids(&gallery.filtered_view(CategoryId::All, "GLASS")), vec!["a"]);
        assert_eq!(ids(&gallery.filtered_view(CategoryId::All, "beacon")), vec!["poster"]);
        assert_eq!(
            ids(&gallery.filtered_view(CategoryId::All, "shadow")),
            vec!["a", "b"]
        );
        assert!(gallery.filtered_view(CategoryId::Nomad, "glass").is_empty());
        Ok(())
    }

    #[test]
    fn switching_category_clears_search() {
        let mut gallery = Gallery::new(vec![
            pin("a", "Glass Garden", CategoryId::Botanica),
            pin("b", "Desert Whisper", CategoryId::Nomad),
        ]);
        gallery.set_search_query("desert");
        assert_eq!(ids(&gallery.visible()), vec!["b"]);
        gallery.set_active_category(CategoryId::Botanica);
        assert_eq!(gallery.search_query(), "");
        assert_eq!(ids(&gallery.visible()), vec!["a"]);
    }

    #[test]
    fn focusing_category_keeps_search() {
        let mut gallery = Gallery::new(vec![
            pin("a", "Glass Garden", CategoryId::Botanica),
            pin("b", "Garden Dune", CategoryId::Nomad),
        ]);
        gallery.set_search_query("garden");
        gallery.focus_category(CategoryId::Nomad);
        assert_eq!(gallery.search_query(), "garden");
        assert_eq!(ids(&gallery.visible()), vec!["b"]);
    }

    #[test]
    fn surrounding_whitespace_in_query_is_matched_literally() {
        let gallery = Gallery::new(vec![
            pin("a", "Glassgarden", CategoryId::Botanica),
            pin("b", "Glass Garden", CategoryId::Botanica),
        ]);
        assert_eq!(ids(&gallery.filtered_view(CategoryId::All, " garden")), vec!["b"]);
        assert_eq!(ids(&gallery.filtered_view(CategoryId::All, "garden")), vec!["a", "b"]);
    }

    #[test]
    fn shuffle_preserves_pins_and_varies_order() {
        let mut gallery = Gallery::new(
            (0..8)
                .map(|idx| pin(&format!("p{idx}"), "Liquid Time", CategoryId::Minimal))
                .collect(),
        );
        let mut original = gallery.pins().iter().map(Pin::id).map(str::to_string).collect::<Vec<_>>();
        original.sort();
        let mut seen = Vec::new();
        for seed in 0..10 {
            gallery.shuffle_with(&mut StdRng::seed_from_u64(seed));
            let order = gallery.pins().iter().map(Pin::id).map(str::to_string).collect::<Vec<_>>();
            let mut sorted = order.clone();
            sorted.sort();
            assert_eq!(sorted, original);
            if !seen.contains(&order) {
                seen.push(order);
            }
        }
        assert!(seen.len() > 1);
        gallery.shuffle();
        assert_eq!(gallery.len(), 8);
    }

    #[test]
    fn shuffle_is_close_to_uniform() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        let trials = 6000;
        for _ in 0..trials {
            let mut gallery = Gallery::new(vec![
                pin("a", "Golden Hour", CategoryId::Nostalgia),
                pin("b", "Static Bloom", CategoryId::Nostalgia),
                pin("c", "Digital Haze", CategoryId::Nostalgia),
            ]);
            gallery.shuffle_with(&mut rng);
            let order = gallery.pins().iter().map(|pin| pin.id().to_string()).collect();
            *counts.entry(order).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);
        for count in counts.values() {
            assert!((850..=1150).contains(count), "skewed permutation count {count}");
        }
    }
}
