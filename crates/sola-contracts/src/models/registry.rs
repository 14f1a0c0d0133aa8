use indexmap::IndexMap;

pub const CAPABILITY_TEXT: &str = "text";
pub const CAPABILITY_IMAGE: &str = "image";
pub const CAPABILITY_VISION: &str = "vision";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    /// Whether image requests may carry an explicit `imageSize` hint.
    pub sized_output: bool,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_provider_capability(&self, provider: &str, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.provider == provider && model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str], sized_output: bool| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
                sized_output,
            },
        );
    };

    insert("gemini-2.5-flash", "gemini", &["text", "vision"], false);
    insert("gemini-2.5-flash-image", "gemini", &["image"], false);
    insert("gemini-3-pro-image-preview", "gemini", &["image"], true);
    insert("gemini-3-pro-preview", "gemini", &["text", "vision"], false);
    insert("dryrun-text-1", "dryrun", &["text", "vision"], false);
    insert("dryrun-image-1", "dryrun", &["image"], false);

    map
}
