//! Log-format template resolution.
//!
//! The collector never hardcodes column positions. A template file mirrors
//! the streaming server's `log_format` directive: field names marked with a
//! `$` sigil and joined by the record delimiter, e.g.
//! `$remote_addr|$host|$uri`. The position of a name in the template is the
//! column index used to extract that field from incoming records.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;

/// Sigil prefixing field names in the template file.
const TEMPLATE_MARKER: &str = "$";

/// Immutable field-name to column-index mapping, parsed once at startup.
#[derive(Debug, Clone)]
pub struct Template {
    blueprint: HashMap<String, usize>,
}

impl Template {
    /// Load a template from disk. Missing or unreadable files are fatal:
    /// without a template no record can be interpreted.
    pub fn load(path: &Path, delimiter: &str) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::TemplateNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::TemplateUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::parse(&content, delimiter))
    }

    /// Build a template from raw source, recording the ordinal position of
    /// each `$name` token.
    pub fn parse(raw: &str, delimiter: &str) -> Self {
        let blueprint = raw
            .split(delimiter)
            .enumerate()
            .map(|(pos, item)| {
                let key = item.replace(TEMPLATE_MARKER, "");
                (key.trim().to_string(), pos)
            })
            .collect();

        Self { blueprint }
    }

    /// Column index for a field name, if the template defines it.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.blueprint.get(name).copied()
    }

    /// Resolve a field name against a split record. `None` when the name is
    /// not in the template or its column lies beyond the current split; the
    /// parser treats both as an empty value.
    pub fn value_of<'a>(&self, name: &str, fields: &[&'a str]) -> Option<&'a str> {
        let pos = self.index_of(name)?;
        fields.get(pos).copied()
    }

    pub fn len(&self) -> usize {
        self.blueprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprint.is_empty()
    }
}
