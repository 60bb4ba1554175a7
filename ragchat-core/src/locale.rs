//! Localized UI strings, per-user rails and welcome pages
//!
//! Strings come from a `locale,key,value` table and rails from a
//! `username,key,value` table. Both are read once at startup; lookups are
//! memoized per locale and per user.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::{RagError, Result};

/// Rails shown when a user has none of their own
pub const DEFAULT_RAILS_USER: &str = "datastax";

#[derive(Debug, Deserialize)]
struct LocalizationRow {
    locale: String,
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RailRow {
    username: String,
    key: String,
    #[serde(default)]
    value: String,
}

/// Strings of one locale
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocaleStrings {
    locale: String,
    entries: HashMap<String, String>,
}

impl LocaleStrings {
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Value for `key`, or the key itself when the locale lacks it
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }
}

/// One suggested question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rail {
    pub key: String,
    pub value: String,
}

/// Startup-loaded catalog of strings, rails and welcome pages
#[derive(Debug)]
pub struct Catalog {
    localization: Vec<LocalizationRow>,
    rails: Vec<RailRow>,
    content_dir: PathBuf,
    default_rails_user: String,
    strings_cache: DashMap<String, Arc<LocaleStrings>>,
    rails_cache: DashMap<String, Arc<Vec<Rail>>>,
}

impl Catalog {
    /// Read both tables; a missing or malformed file is an error
    pub fn load(
        localization_path: impl AsRef<Path>,
        rails_path: impl AsRef<Path>,
        content_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let localization = read_table(localization_path.as_ref())?;
        let rails = read_table(rails_path.as_ref())?;
        info!(
            "Loaded catalog: {} localized strings, {} rails",
            localization.len(),
            rails.len()
        );
        Ok(Self::from_rows(localization, rails, content_dir.into()))
    }

    /// Build from in-memory csv text, for tests and embedded defaults
    pub fn from_csv(localization: &str, rails: &str, content_dir: impl Into<PathBuf>) -> Result<Self> {
        let localization = parse_table(localization.as_bytes(), "<localization>")?;
        let rails = parse_table(rails.as_bytes(), "<rails>")?;
        Ok(Self::from_rows(localization, rails, content_dir.into()))
    }

    fn from_rows(localization: Vec<LocalizationRow>, rails: Vec<RailRow>, content_dir: PathBuf) -> Self {
        Self {
            localization,
            rails,
            content_dir,
            default_rails_user: DEFAULT_RAILS_USER.to_string(),
            strings_cache: DashMap::new(),
            rails_cache: DashMap::new(),
        }
    }

    pub fn with_default_rails_user(mut self, user: impl Into<String>) -> Self {
        self.default_rails_user = user.into();
        self
    }

    /// All strings of `locale`; an unknown locale yields an empty table
    pub fn strings(&self, locale: &str) -> Arc<LocaleStrings> {
        if let Some(cached) = self.strings_cache.get(locale) {
            return Arc::clone(&cached);
        }

        let entries: HashMap<String, String> = self
            .localization
            .iter()
            .filter(|row| row.locale == locale)
            .map(|row| (row.key.clone(), row.value.clone()))
            .collect();
        if entries.is_empty() {
            warn!("No localized strings for locale {}", locale);
        }

        let strings = Arc::new(LocaleStrings {
            locale: locale.to_string(),
            entries,
        });
        self.strings_cache
            .entry(locale.to_string())
            .or_insert(strings)
            .clone()
    }

    /// Rails of `user` in file order, falling back to the default rails user
    pub fn rails(&self, user: &str) -> Arc<Vec<Rail>> {
        if let Some(cached) = self.rails_cache.get(user) {
            return Arc::clone(&cached);
        }

        let mut rails = self.rails_for(user);
        if rails.is_empty() {
            debug!("No rails for {}, using {}", user, self.default_rails_user);
            rails = self.rails_for(&self.default_rails_user);
        }

        self.rails_cache
            .entry(user.to_string())
            .or_insert(Arc::new(rails))
            .clone()
    }

    fn rails_for(&self, user: &str) -> Vec<Rail> {
        self.rails
            .iter()
            .filter(|row| row.username == user)
            .map(|row| Rail {
                key: row.key.clone(),
                value: row.value.clone(),
            })
            .collect()
    }

    /// Markdown welcome page: `{user}.md`, or `welcome.md` when the user has none
    pub async fn welcome(&self, user: &str) -> Result<String> {
        let personal = self.content_dir.join(format!("{user}.md"));
        match tokio::fs::read_to_string(&personal).await {
            Ok(text) => return Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }
        Ok(tokio::fs::read_to_string(self.content_dir.join("welcome.md")).await?)
    }
}

fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|e| RagError::CatalogError {
        path: path.display().to_string(),
        source: e.into(),
    })?;
    parse_table(file, &path.display().to_string())
}

fn parse_table<T: for<'de> Deserialize<'de>>(reader: impl Read, label: &str) -> Result<Vec<T>> {
    csv::Reader::from_reader(reader)
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()
        .map_err(|source| RagError::CatalogError {
            path: label.to_string(),
            source,
        })
}
