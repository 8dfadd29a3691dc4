//! Human-readable labels for permission keys.
//!
//! Resolution order for a full label:
//!
//! 1. translation `custom.<key>`
//! 2. the `custom_permissions` label from config
//! 3. `<action label> <headline(subject)>` when the key splits
//! 4. `headline(key)`

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::keys::SharedKeyBuilder;
use crate::strings;

/// Looks up a translated string by dotted key.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> Option<String>;
}

/// In-memory translation table seeded with the English action labels.
#[derive(Debug, Clone, Default)]
pub struct MapTranslator {
    entries: HashMap<String, String>,
}

impl MapTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn english() -> Self {
        let actions = [
            ("viewAny", "View Any"),
            ("view", "View"),
            ("create", "Create"),
            ("update", "Update"),
            ("delete", "Delete"),
            ("deleteAny", "Delete Any"),
            ("restore", "Restore"),
            ("restoreAny", "Restore Any"),
            ("forceDelete", "Force Delete"),
            ("forceDeleteAny", "Force Delete Any"),
            ("replicate", "Replicate"),
            ("reorder", "Reorder"),
        ];

        Self {
            entries: actions
                .into_iter()
                .map(|(action, label)| (format!("actions.{}", action), label.to_string()))
                .collect(),
        }
    }

    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.entries
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

impl Translator for MapTranslator {
    fn translate(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

#[derive(Clone)]
pub struct LabelResolver {
    builder: SharedKeyBuilder,
    translator: Arc<dyn Translator>,
    custom_labels: IndexMap<String, String>,
}

impl std::fmt::Debug for LabelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelResolver")
            .field("builder", &self.builder)
            .field("custom_labels", &self.custom_labels)
            .finish_non_exhaustive()
    }
}

impl LabelResolver {
    pub fn new(
        builder: SharedKeyBuilder,
        translator: Arc<dyn Translator>,
        custom_labels: IndexMap<String, String>,
    ) -> Self {
        Self {
            builder,
            translator,
            custom_labels,
        }
    }

    pub fn label(&self, key: &str) -> String {
        if let Some(label) = self.translator.translate(&format!("custom.{}", key)) {
            return label;
        }

        if let Some(label) = self.custom_labels.get(key) {
            return label.clone();
        }

        match self.builder.parse(key) {
            Some((action, subject)) => {
                format!("{} {}", self.translated_action(action), strings::headline(subject))
            }
            None => strings::headline(key),
        }
    }

    /// Label for the action half only; the whole key when it does not split.
    pub fn action_label(&self, key: &str) -> String {
        match self.builder.parse(key) {
            Some((action, _)) => self.translated_action(action),
            None => strings::headline(key),
        }
    }

    /// Used inside resource sections where the subject is already the
    /// section heading.
    pub fn short_label(&self, key: &str) -> String {
        self.action_label(key)
    }

    pub fn subject<'k>(&self, key: &'k str) -> &'k str {
        self.builder.extract_subject(key)
    }

    /// Action half of the key, or the whole key when it does not split.
    pub fn action<'k>(&self, key: &'k str) -> &'k str {
        self.builder.parse(key).map(|(action, _)| action).unwrap_or(key)
    }

    fn translated_action(&self, action: &str) -> String {
        self.translator
            .translate(&format!("actions.{}", strings::camel(action)))
            .unwrap_or_else(|| strings::headline(action))
    }
}
