//! Declared record schemas.
//!
//! A [`SchemaDescriptor`] names a record type and lists its fields with a
//! type, description and optionality. The same descriptor drives three
//! things:
//!
//! 1. the field list embedded in the prompt,
//! 2. the `responseSchema` sent to the model ([`SchemaDescriptor::response_schema`]),
//! 3. validation of what comes back ([`SchemaDescriptor::validate`]).
//!
//! Descriptors can also be declared in the settings file:
//!
//! ```yaml
//! schemas:
//!   - name: contract
//!     description: A defence procurement contract
//!     signal_fields: [supplier]
//!     fields:
//!       - { name: supplier, type: string, description: Company awarded the contract }
//!       - { name: value, type: number }
//! ```

use crate::error::{ConfigError, ExtractionError};
use crate::models::Record;
use crate::utils::looks_truncated;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Value type of a schema field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
}

impl FieldKind {
    /// Type name in the model API's schema dialect.
    fn api_type(self) -> &'static str {
        match self {
            FieldKind::String => "STRING",
            FieldKind::Number => "NUMBER",
            FieldKind::Integer => "INTEGER",
            FieldKind::Boolean => "BOOLEAN",
        }
    }

    fn default_value(self) -> Value {
        match self {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Number | FieldKind::Integer => json!(0),
            FieldKind::Boolean => Value::Bool(false),
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            FieldKind::Boolean => value.is_boolean(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub description: String,
    /// Required fields must be present and non-null; the rest default.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    fn optional(name: &str, kind: FieldKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
        }
    }
}

/// A record type the extractor can be asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchemaDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSpec>,
    /// Fields that must be non-empty for a record to count as relevant.
    #[serde(default)]
    pub signal_fields: Vec<String>,
}

impl SchemaDescriptor {
    /// Military and arms-export transactions, one per article.
    pub fn arms_export() -> Self {
        use FieldKind::{Boolean as Bool, Number as Num, String as Str};
        let fields = [
            ("transaction_type", Str, "Type of transaction (e.g., 'Purchase Order', 'Subcontract')"),
            ("company_division", Str, "Company or division name"),
            ("recipient", Str, "Recipient of the transaction"),
            ("amount", Num, "Transaction amount"),
            ("description", Str, "Transaction description"),
            ("address_1", Str, "Address line 1"),
            ("address_2", Str, "Address line 2"),
            ("city", Str, "City"),
            ("province", Str, "Province/State"),
            ("region", Str, "Region"),
            ("postal_code", Str, "Postal code"),
            ("source_date", Str, "Date in YYYY-MM-DD format"),
            ("source_description", Str, "Source description"),
            ("grant_type", Str, "Type of grant"),
            ("commodity_class", Str, "Commodity classification"),
            ("contract_number", Str, "Contract number"),
            ("comments", Str, "Additional comments"),
            ("is_primary", Bool, "Boolean flag indicating if it's primary"),
        ];
        Self {
            name: "arms_export".to_string(),
            description: "A military or arms export transaction".to_string(),
            fields: fields
                .iter()
                .map(|(name, kind, description)| FieldSpec::optional(name, *kind, description))
                .collect(),
            signal_fields: vec![
                "transaction_type".to_string(),
                "company_division".to_string(),
                "recipient".to_string(),
            ],
        }
    }

    /// A weapons sale summarised in five fields.
    pub fn transaction() -> Self {
        let fields = [
            ("company_name", "The name of the company involved in manufacturing or selling."),
            ("weapon_system", "The specific type of weapon, vehicle, or military equipment."),
            ("destination_country", "The country receiving the goods."),
            (
                "sale_value",
                "The monetary value of the deal, including currency (e.g., $15 Billion CAD).",
            ),
            ("summary", "A concise, one-sentence summary of the export deal or report."),
        ];
        Self {
            name: "transaction".to_string(),
            description: "A weapons export deal".to_string(),
            fields: fields
                .iter()
                .map(|(name, description)| FieldSpec::optional(name, FieldKind::String, description))
                .collect(),
            signal_fields: vec![
                "company_name".to_string(),
                "weapon_system".to_string(),
                "destination_country".to_string(),
            ],
        }
    }

    /// A game-related news item.
    pub fn news_item() -> Self {
        let fields = [
            ("game", "Name of the game the article is about."),
            ("date", "Date of the news in YYYY-MM-DD format."),
            ("game_description", "Short description of the game."),
            ("news_description", "Short description of the news itself."),
        ];
        Self {
            name: "news_item".to_string(),
            description: "A news item about a game".to_string(),
            fields: fields
                .iter()
                .map(|(name, description)| FieldSpec::optional(name, FieldKind::String, description))
                .collect(),
            signal_fields: vec!["game".to_string()],
        }
    }

    /// Look up a built-in descriptor by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "arms_export" => Some(Self::arms_export()),
            "transaction" => Some(Self::transaction()),
            "news_item" => Some(Self::news_item()),
            _ => None,
        }
    }

    /// Reject descriptors that cannot work: no fields, duplicate names,
    /// or signal fields that are not declared.
    pub fn check(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid(format!("schema '{}': {reason}", self.name));

        if self.fields.is_empty() {
            return Err(invalid("declares no fields".into()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("has a field with an empty name".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("declares '{}' twice", field.name)));
            }
        }
        if let Some(unknown) = self.signal_fields.iter().find(|s| !seen.contains(s.as_str())) {
            return Err(invalid(format!("signal field '{unknown}' is not declared")));
        }
        Ok(())
    }

    /// Schema sent to the model to constrain its output.
    pub fn response_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = Map::new();
            property.insert("type".into(), json!(field.kind.api_type()));
            if !field.description.is_empty() {
                property.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.clone(), Value::Object(property));
        }

        let mut schema = json!({
            "type": "OBJECT",
            "properties": properties,
            "propertyOrdering": self.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
        });
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        if !self.description.is_empty() {
            schema["description"] = json!(self.description);
        }
        schema
    }

    /// Human-readable field list for the prompt.
    pub fn field_guide(&self) -> String {
        use itertools::Itertools;
        self.fields
            .iter()
            .map(|f| {
                if f.description.is_empty() {
                    format!("    {} ({})", f.name, f.kind.label())
                } else {
                    format!("    {} ({}) - {}", f.name, f.kind.label(), f.description)
                }
            })
            .join("\n")
    }

    /// Parse a model payload and validate it against this schema.
    pub fn validate(&self, payload: &str) -> Result<Record, ExtractionError> {
        let value: Value = serde_json::from_str(payload.trim()).map_err(|e| {
            ExtractionError::MalformedOutput {
                message: e.to_string(),
                truncated: looks_truncated(&e),
            }
        })?;
        self.validate_value(value)
    }

    /// Validate an already-parsed payload.
    ///
    /// Keeps declared fields only, in declaration order, filling defaults
    /// for absent or null optional fields.
    pub fn validate_value(&self, value: Value) -> Result<Record, ExtractionError> {
        let Value::Object(mut object) = value else {
            return Err(ExtractionError::Validation(format!(
                "expected a JSON object for '{}'",
                self.name
            )));
        };

        let mut fields = Map::new();
        for field in &self.fields {
            let value = match object.remove(&field.name) {
                Some(Value::Null) | None if field.required => {
                    return Err(ExtractionError::Validation(format!(
                        "required field '{}' is missing",
                        field.name
                    )));
                }
                Some(Value::Null) | None => field.kind.default_value(),
                Some(v) if field.kind.accepts(&v) => v,
                Some(v) => {
                    return Err(ExtractionError::Validation(format!(
                        "field '{}' should be {}, got {v}",
                        field.name,
                        field.kind.label()
                    )));
                }
            };
            fields.insert(field.name.clone(), value);
        }
        Ok(Record::from_fields(fields))
    }

    /// Signal fields that are empty in `record`. Empty means missing, null,
    /// or a blank string.
    pub fn missing_signals<'a>(&'a self, record: &Record) -> Vec<&'a str> {
        self.signal_fields
            .iter()
            .filter(|name| match record.get(name) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(String::as_str)
            .collect()
    }
}
