use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use super::config::LogLevel;
use super::diagnostics::{
    Diagnostic, Error, LoadError, MergeConflictLocation, MergeError, SourceInfo, Warning,
};

#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub monitor: Option<PartialMonitorConfig>,
    pub persons: Option<BTreeMap<String, PartialPersonConfig>>,
    pub integrations: Option<PartialIntegrationsConfig>,

    /// Source information for error reporting (not serialized)
    #[serde(skip)]
    pub source: Option<SourceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<toml::Spanned<LogLevel>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialMonitorConfig {
    pub low_battery_threshold: Option<toml::Spanned<u8>>,
    pub critical_battery_threshold: Option<toml::Spanned<u8>>,
    pub check_time: Option<toml::Spanned<String>>,
    pub timezone: Option<toml::Spanned<String>>,
    pub exclude: Option<toml::Spanned<Vec<String>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialPersonConfig {
    pub notify: Option<String>,
    pub tracker: Option<String>,
    pub cooldown: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialIntegrationsConfig {
    pub ha: Option<PartialHaConfig>,
    pub mqtt: Option<PartialMqttConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialHaConfig {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialMqttConfig {
    pub broker: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub action_topic: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut config: PartialConfig = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            error: e,
        })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files with import resolution
    ///
    /// Each config file is loaded, then its imports are recursively processed.
    /// Cycle detection prevents infinite loops.
    ///
    /// Returns a Vec of all loaded configs in order (imports first, then parent)
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visited = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visited, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    /// Recursively load a config file and its imports
    fn load_recursive(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        // Canonicalize the path to detect cycles reliably
        let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if visited.contains(&canonical_path) {
            return Err(LoadError::ImportCycle {
                path: canonical_path.clone(),
                cycle: visited.iter().cloned().collect(),
            });
        }

        visited.insert(canonical_path.clone());

        let config = Self::from_file(path)?;

        // Process imports first (depth-first)
        for import_path in &config.imports {
            let import_path_buf = PathBuf::from(import_path);

            // Resolve relative imports from the parent file's directory
            let resolved_path = if import_path_buf.is_absolute() {
                import_path_buf
            } else {
                let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
                parent_dir.join(import_path_buf)
            };

            Self::load_recursive(&resolved_path, visited, configs)?;
        }

        // Add this config after its imports
        configs.push(config);

        // Remove from visited set to allow imports from sibling branches
        visited.remove(&canonical_path);

        Ok(())
    }

    /// Merge multiple partial configs together
    ///
    /// Uses first-wins semantics: the first occurrence of a field is kept.
    /// Conflicts (same field defined in multiple configs) are collected as
    /// errors but merging continues, so all conflicts are reported at once.
    ///
    /// Returns (merged, diagnostics) where diagnostics may contain warnings and errors
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut diagnostics = Vec::new();
        let mut imports = Vec::new();
        let mut merger = FieldMerger::default();

        for config in configs {
            imports.extend(config.imports.clone());

            let source_info = config.source.as_ref().cloned().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            if config.is_empty() {
                diagnostics.push(Diagnostic::Warning(Warning::EmptyConfig {
                    file_path: source_info.file_path.clone(),
                }));
            }

            if let Some(logging) = config.logging {
                let slot = result.logging.get_or_insert(PartialLoggingConfig { level: None });
                merger.take_spanned(
                    "logging.level",
                    logging.level,
                    &mut slot.level,
                    &source_info,
                    &mut diagnostics,
                );
            }

            if let Some(monitor) = config.monitor {
                let slot = result.monitor.get_or_insert_with(PartialMonitorConfig::default);
                merger.take_spanned(
                    "monitor.low_battery_threshold",
                    monitor.low_battery_threshold,
                    &mut slot.low_battery_threshold,
                    &source_info,
                    &mut diagnostics,
                );
                merger.take_spanned(
                    "monitor.critical_battery_threshold",
                    monitor.critical_battery_threshold,
                    &mut slot.critical_battery_threshold,
                    &source_info,
                    &mut diagnostics,
                );
                merger.take_spanned(
                    "monitor.check_time",
                    monitor.check_time,
                    &mut slot.check_time,
                    &source_info,
                    &mut diagnostics,
                );
                merger.take_spanned(
                    "monitor.timezone",
                    monitor.timezone,
                    &mut slot.timezone,
                    &source_info,
                    &mut diagnostics,
                );
                merger.take_spanned(
                    "monitor.exclude",
                    monitor.exclude,
                    &mut slot.exclude,
                    &source_info,
                    &mut diagnostics,
                );
            }

            // Persons merge per person key (first-wins per person)
            if let Some(persons) = config.persons {
                let slot = result.persons.get_or_insert_with(BTreeMap::new);
                for (key, value) in persons {
                    let header = format!("[persons.{}]", key);
                    let span = source_info
                        .content
                        .find(&header)
                        .map(|start| start..(start + header.len()))
                        .unwrap_or(0..0);

                    let conflict_loc = MergeConflictLocation {
                        file_path: source_info.file_path.clone(),
                        span,
                        content: source_info.content.clone(),
                    };

                    if let Some(prev_loc) = merger.persons.get(&key) {
                        diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                            field_path: format!("persons.{}", key),
                            message: format!("Person '{}' defined in multiple config files", key),
                            conflicts: vec![prev_loc.clone(), conflict_loc],
                        })));
                    } else {
                        slot.insert(key.clone(), value);
                        merger.persons.insert(key, conflict_loc);
                    }
                }
            }

            // Integration sections merge whole-section, first-wins
            if let Some(integrations) = config.integrations {
                let slot = result.integrations.get_or_insert_with(PartialIntegrationsConfig::default);
                if slot.ha.is_none() {
                    slot.ha = integrations.ha;
                }
                if slot.mqtt.is_none() {
                    slot.mqtt = integrations.mqtt;
                }
            }
        }

        result.imports = imports;

        (result, diagnostics)
    }

    fn is_empty(&self) -> bool {
        self.logging.is_none()
            && self.monitor.is_none()
            && self.persons.is_none()
            && self.integrations.is_none()
            && self.imports.is_empty()
    }
}

/// Tracks where each field was first defined, for first-wins merging with
/// conflict reporting.
#[derive(Default)]
struct FieldMerger {
    fields: std::collections::HashMap<&'static str, MergeConflictLocation>,
    persons: std::collections::HashMap<String, MergeConflictLocation>,
}

impl FieldMerger {
    /// Move a spanned field into `slot` if it is still unset; record a merge
    /// conflict otherwise. The first definition always wins.
    fn take_spanned<T>(
        &mut self,
        field_path: &'static str,
        incoming: Option<toml::Spanned<T>>,
        slot: &mut Option<toml::Spanned<T>>,
        source: &SourceInfo,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let Some(spanned) = incoming else {
            return;
        };

        let conflict_loc = MergeConflictLocation {
            file_path: source.file_path.clone(),
            span: spanned.span(),
            content: source.content.clone(),
        };

        if let Some(prev_loc) = self.fields.get(field_path) {
            diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                field_path: field_path.to_string(),
                message: format!("'{}' defined in multiple config files", field_path),
                conflicts: vec![prev_loc.clone(), conflict_loc],
            })));
        } else {
            *slot = Some(spanned);
            self.fields.insert(field_path, conflict_loc);
        }
    }
}
