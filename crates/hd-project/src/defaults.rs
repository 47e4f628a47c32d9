//! Locale defaults for metadata that older drawings lack.
//!
//! The migration pipeline never hard-codes catalogs, units or flow systems;
//! it asks an injected [`DefaultsProvider`].

use std::collections::BTreeMap;
use std::path::Path;

use hd_core::Locale;
use hd_document::{FlowSystem, Properties, UnitsParameters};
use serde::{Deserialize, Serialize};

use crate::ProjectResult;

/// Default metadata for one locale. Absent parts are left alone by the
/// steps that would otherwise fill them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<UnitsParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_table: Option<Properties>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_systems: Vec<FlowSystem>,
}

impl PartialMetadata {
    pub fn flow_system(&self, uid: &str) -> Option<&FlowSystem> {
        self.flow_systems.iter().find(|s| s.uid == uid)
    }
}

pub trait DefaultsProvider {
    fn metadata_defaults(&self, locale: Locale) -> PartialMetadata;
}

/// The same defaults for every locale.
impl DefaultsProvider for PartialMetadata {
    fn metadata_defaults(&self, _locale: Locale) -> PartialMetadata {
        self.clone()
    }
}

/// Defaults read from a YAML file keyed by locale tag (`en-au`, `en-us`,
/// `en-uk`). A locale missing from the file falls back to `en-au`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileDefaults {
    by_locale: BTreeMap<Locale, PartialMetadata>,
}

impl FileDefaults {
    pub fn load(path: &Path) -> ProjectResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(text: &str) -> ProjectResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn locales(&self) -> impl Iterator<Item = Locale> + '_ {
        self.by_locale.keys().copied()
    }
}

impl DefaultsProvider for FileDefaults {
    fn metadata_defaults(&self, locale: Locale) -> PartialMetadata {
        self.by_locale
            .get(&locale)
            .or_else(|| self.by_locale.get(&Locale::default()))
            .cloned()
            .unwrap_or_default()
    }
}
