//! Profile store
//!
//! `ProfileStore` is the persistence boundary for mapping profiles. The JSON
//! store keeps one pretty-printed document per profile in a directory; the
//! memory store keeps them in a map.

use crate::mapping::profile::{
    unix_now, MappingProfile, ProfileError, ProfileTemplate, CURRENT_VERSION,
    DEFAULT_PROFILE_NAME,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Profile I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profile document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Profile '{0}' not found")]
    NotFound(String),

    #[error("Cannot delete the built-in profile '{0}'")]
    Protected(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Sort orders offered by `ProfileStore::profiles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileSortOrder {
    /// "Default" first, then alphabetical
    #[default]
    Name,
    LastUsed,
    MostUsed,
    /// Favorites first, then alphabetical
    Favorites,
    CreatedDate,
}

impl ProfileSortOrder {
    pub fn sort(self, profiles: &mut [MappingProfile]) {
        match self {
            ProfileSortOrder::Name => profiles.sort_by(|a, b| name_key(&a.name).cmp(&name_key(&b.name))),
            ProfileSortOrder::LastUsed => profiles.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at)),
            ProfileSortOrder::MostUsed => profiles.sort_by(|a, b| b.usage_count.cmp(&a.usage_count)),
            ProfileSortOrder::Favorites => profiles.sort_by(|a, b| {
                b.is_favorite
                    .cmp(&a.is_favorite)
                    .then_with(|| a.name.cmp(&b.name))
            }),
            ProfileSortOrder::CreatedDate => profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }
}

/// Sort key that puts the built-in profile ahead of everything else
fn name_key(name: &str) -> (bool, &str) {
    (name != DEFAULT_PROFILE_NAME, name)
}

pub fn is_protected(name: &str) -> bool {
    name.eq_ignore_ascii_case(DEFAULT_PROFILE_NAME)
}

/// Persistence boundary for mapping profiles
pub trait ProfileStore: Send + Sync {
    /// Load, migrate and validate a profile
    fn load(&self, name: &str) -> Result<MappingProfile, StoreError>;

    /// Validate and persist; returns the stored copy with fresh timestamps
    fn save(&self, profile: &MappingProfile) -> Result<MappingProfile, StoreError>;

    /// Stored names, "Default" first
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove a profile; built-in names are rejected
    fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Key a name is stored under; two names with the same key share a slot.
    ///
    /// `list` returns keys, so every collision check compares keys.
    fn storage_key(&self, name: &str) -> String {
        name.to_string()
    }

    fn contains(&self, name: &str) -> Result<bool, StoreError> {
        let key = self.storage_key(name);
        Ok(self.list()?.iter().any(|n| self.storage_key(n) == key))
    }

    /// Whether `name` would land on one of `names`
    fn is_taken(&self, names: &[String], name: &str) -> bool {
        let key = self.storage_key(name);
        names.iter().any(|n| self.storage_key(n) == key)
    }

    /// Every loadable profile in the requested order.
    ///
    /// Profiles that fail to load are logged and skipped.
    fn profiles(&self, order: ProfileSortOrder) -> Result<Vec<MappingProfile>, StoreError> {
        let mut profiles = Vec::new();
        for name in self.list()? {
            match self.load(&name) {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!("Skipping profile '{}': {}", name, e),
            }
        }
        order.sort(&mut profiles);
        Ok(profiles)
    }

    /// First free name of the form `base`, `base (1)`, `base (2)`, ...
    fn unique_name(&self, base: &str) -> Result<String, StoreError> {
        let names = self.list()?;
        let mut candidate = base.to_string();
        let mut counter = 1;
        while self.is_taken(&names, &candidate) {
            candidate = format!("{} ({})", base, counter);
            counter += 1;
        }
        Ok(candidate)
    }

    /// Seed the built-in profiles that are missing; returns how many were written
    fn ensure_defaults(&self) -> Result<usize, StoreError> {
        let builtins = [
            MappingProfile::default_profile(),
            ProfileTemplate::Racing.create(),
            ProfileTemplate::RocketLeague.create(),
        ];

        let mut created = 0;
        for profile in builtins {
            if !self.contains(&profile.name)? {
                info!("Seeding built-in profile '{}'", profile.name);
                self.save(&profile)?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Store a new profile built from a template under a unique name
    fn create_from_template(&self, template: ProfileTemplate) -> Result<MappingProfile, StoreError> {
        let name = self.unique_name(template.name())?;
        let profile = template.create().clone_as(name);
        self.save(&profile)
    }

    /// Write a profile to an arbitrary path as pretty JSON
    fn export_profile(&self, name: &str, destination: &Path) -> Result<(), StoreError> {
        let profile = self.load(name)?;
        fs::write(destination, serde_json::to_string_pretty(&profile)?)?;
        info!("Exported profile '{}' to {}", name, destination.display());
        Ok(())
    }

    /// Read a profile document from `source` and store it without
    /// overwriting an existing profile
    fn import_profile(&self, source: &Path) -> Result<MappingProfile, StoreError> {
        let content = fs::read_to_string(source)?;
        let mut profile = serde_json::from_str::<MappingProfile>(&content)?.migrate()?;
        profile.validate()?;

        let original = profile.name.clone();
        let names = self.list()?;
        let mut counter = 1;
        while self.is_taken(&names, &profile.name) {
            profile.name = format!("{} (Imported {})", original, counter);
            counter += 1;
        }

        info!("Imported profile '{}' from {}", profile.name, source.display());
        self.save(&profile)
    }
}

/// Stamp and check a profile on its way into a store
fn prepare_for_save(profile: &MappingProfile) -> Result<MappingProfile, StoreError> {
    profile.validate()?;

    let mut stored = profile.clone();
    let now = unix_now();
    stored.version = CURRENT_VERSION;
    stored.modified_at = now;
    if stored.created_at == 0 {
        stored.created_at = now;
    }
    Ok(stored)
}

/// Replace characters that are not allowed in file names
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// One JSON document per profile under a directory
#[derive(Debug)]
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    /// Open (and create if needed) the profile directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Profile store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_name(name)))
    }
}

impl ProfileStore for JsonProfileStore {
    fn storage_key(&self, name: &str) -> String {
        sanitize_file_name(name)
    }

    fn load(&self, name: &str) -> Result<MappingProfile, StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let content = fs::read_to_string(&path)?;
        let mut profile: MappingProfile = serde_json::from_str(&content)?;
        // The file name is authoritative
        profile.name = name.to_string();

        let profile = profile.migrate()?;
        profile.validate()?;
        debug!("Loaded profile '{}' from {}", name, path.display());
        Ok(profile)
    }

    fn save(&self, profile: &MappingProfile) -> Result<MappingProfile, StoreError> {
        let stored = prepare_for_save(profile)?;
        let path = self.path_for(&stored.name);
        fs::write(&path, serde_json::to_string_pretty(&stored)?)?;
        info!("✓ Saved profile '{}' to {}", stored.name, path.display());
        Ok(stored)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort_by(|a, b| name_key(a).cmp(&name_key(b)));
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        if is_protected(name) {
            return Err(StoreError::Protected(name.to_string()));
        }
        let path = self.path_for(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        fs::remove_file(&path)?;
        info!("Deleted profile '{}'", name);
        Ok(())
    }
}

/// In-memory store with the same contract as the JSON store
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<BTreeMap<String, MappingProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, name: &str) -> Result<MappingProfile, StoreError> {
        let profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        let profile = profiles
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(profile)
    }

    fn save(&self, profile: &MappingProfile) -> Result<MappingProfile, StoreError> {
        let stored = prepare_for_save(profile)?;
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stored.name.clone(), stored.clone());
        debug!("Stored profile '{}' in memory", stored.name);
        Ok(stored)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = profiles.keys().cloned().collect();
        names.sort_by(|a, b| name_key(a).cmp(&name_key(b)));
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        if is_protected(name) {
            return Err(StoreError::Protected(name.to_string()));
        }
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}
