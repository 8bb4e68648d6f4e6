//! Read-only template snapshot, loaded once at startup.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::TemplateKey;
use crate::error::TemplateError;
use crate::store::traits::TemplateStore;

/// Templates shipped with the crate and seeded into new databases.
pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "urgent_critical",
        "Hello {{SENDER_NAME}},\n\n\
         We received your message \"{{SUBJECT}}\" and flagged it as critical. \
         An engineer has been notified and will contact you as soon as possible.\n\n\
         Support Team",
    ),
    (
        "negative_repeated",
        "Hello {{SENDER_NAME}},\n\n\
         We are sorry you had to contact us again about \"{{SUBJECT}}\". \
         This is message {{EMAIL_COUNT}} from you; the last one arrived on {{LAST_EMAIL_DATE}}. \
         Your case has been escalated to a senior agent.\n\n\
         Support Team",
    ),
    (
        "frequent_sender",
        "Hello {{SENDER_NAME}},\n\n\
         Thanks for reaching out again (message {{EMAIL_COUNT}}). \
         We are looking into \"{{SUBJECT}}\" and will reply shortly.\n\n\
         Support Team",
    ),
    (
        "default",
        "Hello {{SENDER_NAME}},\n\n\
         Thank you for your message about \"{subject}\". We have received it \
         and will get back to you shortly.\n\n\
         Your request: {summary}\n\n\
         Support Team",
    ),
];

/// Immutable key → template body mapping.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, String>,
}

impl TemplateCatalog {
    pub fn new<K, V>(templates: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The built-in templates only.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_TEMPLATES.iter().copied())
    }

    /// Snapshot every template in `store`.
    pub async fn load(store: &dyn TemplateStore) -> Result<Self, TemplateError> {
        let keys = store.list_template_keys().await?;
        let mut templates = HashMap::with_capacity(keys.len());
        for key in keys {
            let body = store.get_template(&key).await?;
            templates.insert(key, body);
        }
        let catalog = Self { templates };
        catalog.warn_missing();
        Ok(catalog)
    }

    /// Override templates with `<key>.txt` files from `dir`.
    /// Returns the number of files loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let read_err = |source| TemplateError::Read {
            path: dir.display().to_string(),
            source,
        };

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let body = std::fs::read_to_string(&path).map_err(|source| TemplateError::Read {
                path: path.display().to_string(),
                source,
            })?;
            self.templates.insert(key.to_string(), body);
            loaded += 1;
        }

        info!(dir = %dir.display(), loaded, "Loaded template overrides");
        Ok(loaded)
    }

    /// Template body for `key`. Absent keys are an error, never defaulted.
    pub fn get(&self, key: &str) -> Result<&str, TemplateError> {
        self.templates
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| TemplateError::NotFound {
                key: key.to_string(),
            })
    }

    /// Sorted template keys.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Selector keys with no template in this catalog.
    pub fn missing_keys(&self) -> Vec<TemplateKey> {
        TemplateKey::ALL
            .into_iter()
            .filter(|k| !self.templates.contains_key(k.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn warn_missing(&self) {
        for key in self.missing_keys() {
            warn!(template = %key, "No template for selector key; replies using it will be withheld");
        }
    }
}

#[async_trait]
impl TemplateStore for TemplateCatalog {
    async fn get_template(&self, key: &str) -> Result<String, TemplateError> {
        self.get(key).map(str::to_string)
    }

    async fn list_template_keys(&self) -> Result<Vec<String>, TemplateError> {
        Ok(self.keys().into_iter().map(str::to_string).collect())
    }
}
