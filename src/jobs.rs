//! Extraction jobs: which schema to ask for, with what extra guidance, and
//! whether records without signal fields are dropped.
//!
//! Three presets ship with the binary; more can be declared in the settings
//! file:
//!
//! ```yaml
//! jobs:
//!   - name: drone-sales
//!     schema: transaction
//!     instructions: Only extract deals involving unmanned aircraft.
//! ```

use crate::config::Settings;
use crate::error::ConfigError;
use crate::extract::SchemaDescriptor;
use serde::Deserialize;

const ARMS_EXPORT_INSTRUCTIONS: &str = "\
From the document text, extract key details about any military or arms exports.
If the article does not describe a military or arms export, leave the fields empty.";

const TRANSACTION_INSTRUCTIONS: &str = "\
You have been given the site content for some article.
If the article describes some sort of military weapons transaction involving the Canadian government, \
extract the relevant details based on the schema.
If the article has nothing to do with a military weapons transaction, leave the fields blank.
Additionally, if there isn't enough information to definitively determine the value of a field, leave it blank.";

/// A job as written in the settings file. The schema is referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    pub schema: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_relevance_filter")]
    pub relevance_filter: bool,
}

fn default_relevance_filter() -> bool {
    true
}

/// A fully resolved job, ready for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub schema: SchemaDescriptor,
    pub instructions: Option<String>,
    /// Drop records whose signal fields are empty.
    pub relevance_filter: bool,
}

impl Job {
    pub fn arms_exports() -> Self {
        Self {
            name: "arms-exports".to_string(),
            schema: SchemaDescriptor::arms_export(),
            instructions: Some(ARMS_EXPORT_INSTRUCTIONS.to_string()),
            relevance_filter: true,
        }
    }

    pub fn transactions() -> Self {
        Self {
            name: "transactions".to_string(),
            schema: SchemaDescriptor::transaction(),
            instructions: Some(TRANSACTION_INSTRUCTIONS.to_string()),
            relevance_filter: true,
        }
    }

    pub fn news_items() -> Self {
        Self {
            name: "news-items".to_string(),
            schema: SchemaDescriptor::news_item(),
            instructions: None,
            relevance_filter: false,
        }
    }

    fn preset(name: &str) -> Option<Self> {
        match name {
            "arms-exports" => Some(Self::arms_exports()),
            "transactions" => Some(Self::transactions()),
            "news-items" => Some(Self::news_items()),
            _ => None,
        }
    }

    /// Resolve a job by name. Jobs declared in settings shadow presets, and
    /// schemas declared in settings shadow built-in ones.
    pub fn resolve(name: &str, settings: &Settings) -> Result<Self, ConfigError> {
        let Some(spec) = settings.jobs.iter().find(|j| j.name == name) else {
            return Self::preset(name).ok_or_else(|| ConfigError::Unknown {
                kind: "job",
                name: name.to_string(),
            });
        };

        let schema = settings
            .schemas
            .iter()
            .find(|s| s.name == spec.schema)
            .cloned()
            .or_else(|| SchemaDescriptor::builtin(&spec.schema))
            .ok_or_else(|| ConfigError::Unknown {
                kind: "schema",
                name: spec.schema.clone(),
            })?;

        Ok(Self {
            name: spec.name.clone(),
            schema,
            instructions: spec.instructions.clone(),
            relevance_filter: spec.relevance_filter,
        })
    }
}
