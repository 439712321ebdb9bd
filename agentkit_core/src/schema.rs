//! Declarative input schemas and the shared validator that enforces them.
//!
//! A [`Schema`] is a closed list of [`FieldSpec`]s. Validation never stops at
//! the first problem: every missing, unknown or mistyped field is reported so
//! a caller can correct all of them in one round-trip.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Number, Value};

use crate::error::Violation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// A string restricted to the listed values.
    Enum(Vec<String>),
}

impl FieldType {
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldType::Enum(values.into_iter().map(Into::into).collect())
    }

    fn describe(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Enum(values) => format!("one of [{}]", values.join(", ")),
        }
    }

    fn json_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Enum(_) => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }

    /// Coerces `value` into this type, or returns a description of what was found.
    fn coerce(&self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (FieldType::String, Value::String(_)) => Ok(value.clone()),
            (FieldType::Integer, Value::Number(number)) => {
                if let Some(int) = number.as_i64() {
                    return Ok(Value::from(int));
                }
                match number.as_f64() {
                    Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
                        Ok(Value::from(float as i64))
                    }
                    _ => Err(format!("number {number}")),
                }
            }
            (FieldType::Integer, Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("string '{text}'")),
            (FieldType::Number, Value::Number(_)) => Ok(value.clone()),
            (FieldType::Number, Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("string '{text}'")),
            (FieldType::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (FieldType::Boolean, Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("string '{text}'")),
            },
            (FieldType::Enum(values), Value::String(text)) => {
                if values.iter().any(|allowed| allowed == text) {
                    Ok(value.clone())
                } else {
                    Err(format!("'{text}'"))
                }
            }
            (_, other) => Err(kind_of(other).to_string()),
        }
    }
}

/// One named input of an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    ty: FieldType,
    required: bool,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: description.into(),
            example: None,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    /// An optional field that takes `default` when the caller leaves it out.
    pub fn with_default(
        name: impl Into<String>,
        ty: FieldType,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::optional(name, ty, description)
        }
    }

    /// Documentation only; never parsed.
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn example_value(&self) -> Option<&str> {
        self.example.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// A closed set of fields. Keys outside the set are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// A schema that accepts no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields.iter().filter(|field| field.required)
    }

    pub fn validate(&self, raw: Value) -> Result<ActionArgs, Vec<Violation>> {
        let input = into_object(raw)?;
        let mut normalized = Map::new();
        let mut violations = Vec::new();

        for field in &self.fields {
            match input.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(Violation::Missing {
                            field: field.name.clone(),
                        });
                    } else if let Some(default) = &field.default {
                        normalized.insert(field.name.clone(), default.clone());
                    }
                }
                Some(value) => match field.ty.coerce(value) {
                    Ok(value) => {
                        normalized.insert(field.name.clone(), value);
                    }
                    Err(found) => violations.push(Violation::Mistyped {
                        field: field.name.clone(),
                        expected: field.ty.describe(),
                        found,
                    }),
                },
            }
        }

        let known: HashSet<&str> = self.fields.iter().map(|field| field.name.as_str()).collect();
        let mut unknown: Vec<&String> = input
            .keys()
            .filter(|key| !known.contains(key.as_str()))
            .collect();
        unknown.sort();
        violations.extend(unknown.into_iter().map(|key| Violation::Unknown { field: key.clone() }));

        if violations.is_empty() {
            Ok(ActionArgs(normalized))
        } else {
            Err(violations)
        }
    }

    /// Renders the fields as a JSON Schema object for tool-declaration formats.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({
                "type": field.ty.json_type(),
                "description": field.description,
            });
            if let FieldType::Enum(values) = &field.ty {
                property["enum"] = json!(values);
            }
            if let Some(default) = &field.default {
                property["default"] = default.clone();
            }
            if let Some(example) = &field.example {
                property["examples"] = json!([example]);
            }
            properties.insert(field.name.clone(), property);
        }

        let required: Vec<&str> = self
            .required_fields()
            .map(|field| field.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

/// Arguments that passed validation: every required field present, types normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionArgs(Map<String, Value>);

impl ActionArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Deserializes the arguments into an action's input struct.
    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn into_object(raw: Value) -> Result<Map<String, Value>, Vec<Violation>> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        // Agents frequently send the arguments as an encoded string, or an empty one.
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(Map::new());
            }
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(map),
                _ => Err(vec![Violation::NotAnObject { found: "string" }]),
            }
        }
        other => Err(vec![Violation::NotAnObject {
            found: kind_of(&other),
        }]),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
