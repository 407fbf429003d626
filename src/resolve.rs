use serde::Serialize;

use crate::alias::AliasTable;
use crate::config::AnalyzerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub resolved_path: String,
    pub was_alias: bool,
    pub is_module: bool,
}

impl Resolution {
    fn unchanged(name: &str) -> Self {
        Self {
            resolved_path: name.to_string(),
            was_alias: false,
            is_module: false,
        }
    }
}

/// Maps a name as written in source back to a canonical runtime path.
pub struct PathResolver<'a> {
    config: &'a AnalyzerConfig,
    aliases: &'a AliasTable,
}

impl<'a> PathResolver<'a> {
    pub fn new(config: &'a AnalyzerConfig, aliases: &'a AliasTable) -> Self {
        Self { config, aliases }
    }

    pub fn resolve(&self, name: &str) -> Resolution {
        if self.config.is_runtime_path(name) {
            return Resolution::unchanged(name);
        }

        // Exact match also covers compound `object.property` aliases.
        if let Some(alias) = self.aliases.get(name) {
            tracing::trace!(name, path = %alias.original_path, "resolved alias");
            return Resolution {
                resolved_path: alias.original_path.clone(),
                was_alias: true,
                is_module: alias.is_module,
            };
        }

        if let Some((head, rest)) = name.split_once('.')
            && let Some(alias) = self.aliases.get(head).filter(|a| a.is_module)
        {
            let resolved_path = format!("{}.{rest}", alias.original_path);
            tracing::trace!(name, path = %resolved_path, "resolved through module alias");
            return Resolution {
                resolved_path,
                was_alias: true,
                is_module: true,
            };
        }

        Resolution::unchanged(name)
    }
}
