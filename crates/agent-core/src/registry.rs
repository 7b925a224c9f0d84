//! Provider Registry
//!
//! Maps provider identifiers (`primary`, `secondary`, or a vendor name) to
//! lazily-constructed providers. Construction failures degrade to a null
//! provider that deterministically fails `Unavailable`, so the rest of the
//! system can start and report health instead of crashing at boot.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};
use crate::provider::{GenerationConfig, LlmProvider, ProviderInfo};

/// Registry slot for the preferred vendor
pub const PRIMARY: &str = "primary";

/// Registry slot for the fallback vendor
pub const SECONDARY: &str = "secondary";

/// Model used when the routing table has no entry for a report kind
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Report kinds routed through the model map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Report,
    DailyPick,
    DeepResearchSynthesis,
    Planning,
    QuestionAnswer,
}

/// Report-kind → model-name routing table
///
/// Empty entries fall back to [`DEFAULT_MODEL`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelMap {
    pub report: String,
    pub daily_pick: String,
    pub deep_research_synthesis: String,
    pub planning: String,
    pub question_answer: String,
}

impl Default for ModelMap {
    fn default() -> Self {
        Self {
            report: "gemini-2.0-flash".into(),
            daily_pick: "gemini-2.0-flash".into(),
            deep_research_synthesis: "gemini-2.0-pro".into(),
            planning: "gemini-2.0-flash".into(),
            question_answer: "gemini-2.0-flash".into(),
        }
    }
}

impl ModelMap {
    /// Resolve the model for a report kind
    pub fn model_for(&self, kind: ReportKind) -> &str {
        let entry = match kind {
            ReportKind::Report => &self.report,
            ReportKind::DailyPick => &self.daily_pick,
            ReportKind::DeepResearchSynthesis => &self.deep_research_synthesis,
            ReportKind::Planning => &self.planning,
            ReportKind::QuestionAnswer => &self.question_answer,
        };
        if entry.is_empty() { DEFAULT_MODEL } else { entry }
    }
}

/// Constructor for a provider, invoked on first use
pub type ProviderFactory = Box<dyn Fn() -> anyhow::Result<Arc<dyn LlmProvider>> + Send + Sync>;

/// Process-lifetime registry of providers
///
/// Providers are singletons per identifier: the first successful
/// construction is cached and shared; configuration is immutable after
/// init.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
    aliases: HashMap<String, String>,
    cache: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    model_map: ModelMap,
}

impl ProviderRegistry {
    pub fn new(model_map: ModelMap) -> Self {
        Self {
            factories: HashMap::new(),
            aliases: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
            model_map,
        }
    }

    /// Register a vendor factory
    pub fn register(&mut self, vendor: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(vendor.into(), factory);
    }

    /// Point a slot (`primary`/`secondary`) at a vendor name
    pub fn set_alias(&mut self, slot: impl Into<String>, vendor: impl Into<String>) {
        self.aliases.insert(slot.into(), vendor.into());
    }

    fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map_or(id, String::as_str)
    }

    /// Get a provider, degrading to a null provider on unknown ids or
    /// construction failure
    pub fn get(&self, id: &str) -> Arc<dyn LlmProvider> {
        match self.try_get(id) {
            Ok(provider) => provider,
            Err(err) => {
                tracing::error!(provider = id, kind = err.kind(), "provider init failed, degrading");
                Arc::new(NullProvider::new(self.resolve(id)))
            }
        }
    }

    /// Get a provider, failing fast instead of degrading
    pub fn try_get(&self, id: &str) -> Result<Arc<dyn LlmProvider>> {
        let vendor = self.resolve(id).to_string();

        if let Some(provider) = self.cache.read().unwrap().get(&vendor) {
            return Ok(Arc::clone(provider));
        }

        let factory = self
            .factories
            .get(&vendor)
            .ok_or_else(|| ProviderError::Config(format!("unknown provider '{vendor}'")))?;

        let provider = factory()
            .map_err(|err| ProviderError::Config(format!("provider '{vendor}' init: {err}")))?;

        // Failed constructions are not cached, so a later call can recover
        self.cache
            .write()
            .unwrap()
            .entry(vendor)
            .or_insert_with(|| Arc::clone(&provider));
        Ok(provider)
    }

    /// Shortcut for the primary slot
    pub fn primary(&self) -> Arc<dyn LlmProvider> {
        self.get(PRIMARY)
    }

    /// Shortcut for the secondary slot
    pub fn secondary(&self) -> Arc<dyn LlmProvider> {
        self.get(SECONDARY)
    }

    /// Resolve the provider and model for a report kind
    pub fn get_for_report(&self, kind: ReportKind) -> (Arc<dyn LlmProvider>, String) {
        let model = self.model_map.model_for(kind).to_string();
        (self.primary(), model)
    }

    /// The routing table this registry was built with
    pub const fn model_map(&self) -> &ModelMap {
        &self.model_map
    }
}

/// Provider that deterministically fails with `Unavailable`
///
/// Returned when a real provider could not be constructed, letting the
/// process run in degraded mode rather than refuse to start.
pub struct NullProvider {
    vendor: String,
}

impl NullProvider {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
        }
    }

    fn unavailable(&self) -> ProviderError {
        ProviderError::Unavailable(format!("provider '{}' is not configured", self.vendor))
    }
}

#[async_trait]
impl LlmProvider for NullProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: format!("null({})", self.vendor),
            supports_search: false,
            supports_system_prompt: false,
        }
    }

    async fn healthcheck(&self) -> Result<bool> {
        Ok(false)
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<String> {
        Err(self.unavailable())
    }

    async fn generate_json(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<Map<String, Value>> {
        Err(self.unavailable())
    }

    async fn generate_with_search(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<String> {
        Err(self.unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned;

    #[async_trait]
    impl LlmProvider for Canned {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "canned".into(),
                supports_search: false,
                supports_system_prompt: true,
            }
        }
        async fn healthcheck(&self) -> Result<bool> {
            Ok(true)
        }
        async fn generate_text(
            &self,
            _prompt: &str,
            _system_prompt: Option<&str>,
            _config: &GenerationConfig,
        ) -> Result<String> {
            Ok("canned".into())
        }
    }

    #[test]
    fn test_lazy_construction_and_caching() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        let mut registry = ProviderRegistry::new(ModelMap::default());
        registry.register(
            "canned",
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Canned) as Arc<dyn LlmProvider>)
            }),
        );
        registry.set_alias(PRIMARY, "canned");

        assert_eq!(built.load(Ordering::SeqCst), 0);
        let a = registry.primary();
        let b = registry.get("canned");
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(a.info().name, b.info().name);
    }

    #[tokio::test]
    async fn test_unknown_provider_degrades_to_null() {
        let registry = ProviderRegistry::new(ModelMap::default());
        let provider = registry.get("nope");

        assert!(!provider.healthcheck().await.unwrap());
        let err = provider
            .generate_text("p", None, &GenerationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[tokio::test]
    async fn test_factory_failure_degrades_to_null() {
        let mut registry = ProviderRegistry::new(ModelMap::default());
        registry.register("broken", Box::new(|| anyhow::bail!("no api key")));

        let provider = registry.get("broken");
        let err = provider
            .generate_text("p", None, &GenerationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_model_map_fallback() {
        let mut map = ModelMap::default();
        map.question_answer = String::new();
        assert_eq!(map.model_for(ReportKind::QuestionAnswer), DEFAULT_MODEL);
        assert_eq!(
            map.model_for(ReportKind::DeepResearchSynthesis),
            "gemini-2.0-pro"
        );
    }
}
