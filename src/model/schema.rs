use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Shape of a single value in an incoming payload.
///
/// Schemas validate and sanitize at the same time: object schemas decide what
/// happens to fields they do not declare (see [`UnknownFields`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSchema {
    Any,
    String,
    Number,
    Boolean,
    Object {
        #[serde(default)]
        fields: BTreeMap<String, FieldDef>,
        #[serde(default)]
        unknown: UnknownFields,
    },
    List {
        items: Box<FieldSchema>,
    },
    Union {
        variants: Vec<FieldSchema>,
    },
}

/// What an object schema does with fields it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFields {
    /// Drop them from the sanitized output
    #[default]
    Strip,
    /// Pass them through untouched
    Keep,
    /// Fail validation
    Reject,
}

/// A declared field: its schema plus whether it may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(flatten)]
    pub schema: FieldSchema,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// First failing field found while validating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: Vec<String>,
    pub reason: String,
}

impl SchemaViolation {
    fn new(path: &[String], reason: String) -> Self {
        Self {
            path: path.to_vec(),
            reason,
        }
    }

    /// Dot-separated path of the failing field, e.g. `relationships.tags.1`.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.reason, self.path_string())
    }
}

impl FieldSchema {
    pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, FieldDef)>) -> Self {
        FieldSchema::Object {
            fields: fields
                .into_iter()
                .map(|(name, def)| (name.to_string(), def))
                .collect(),
            unknown: UnknownFields::Strip,
        }
    }

    /// Object schema with no declared fields that keeps everything.
    pub fn any_object() -> Self {
        FieldSchema::Object {
            fields: BTreeMap::new(),
            unknown: UnknownFields::Keep,
        }
    }

    pub fn list(items: FieldSchema) -> Self {
        FieldSchema::List {
            items: Box::new(items),
        }
    }

    pub fn union(variants: Vec<FieldSchema>) -> Self {
        FieldSchema::Union { variants }
    }

    /// Change how an object schema treats undeclared fields. No-op for
    /// non-object schemas.
    pub fn with_unknown(mut self, mode: UnknownFields) -> Self {
        if let FieldSchema::Object { unknown, .. } = &mut self {
            *unknown = mode;
        }
        self
    }

    pub fn required(self) -> FieldDef {
        FieldDef {
            schema: self,
            optional: false,
        }
    }

    pub fn optional(self) -> FieldDef {
        FieldDef {
            schema: self,
            optional: true,
        }
    }

    /// Schema for one relationship entry.
    ///
    /// Without custom fields an entry is either the bare id or `{ id }`.
    /// With custom fields an entry must be an object carrying `id` plus the
    /// custom fields; undeclared extras are kept on the association row.
    pub fn relationship(id: FieldSchema, custom: Option<BTreeMap<String, FieldDef>>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), id.clone().required());

        match custom {
            Some(custom) => {
                fields.extend(custom);
                FieldSchema::Object {
                    fields,
                    unknown: UnknownFields::Keep,
                }
            }
            None => FieldSchema::union(vec![
                id,
                FieldSchema::Object {
                    fields,
                    unknown: UnknownFields::Reject,
                },
            ]),
        }
    }

    /// List of [`FieldSchema::relationship`] entries.
    pub fn relationship_list(id: FieldSchema, custom: Option<BTreeMap<String, FieldDef>>) -> Self {
        Self::list(Self::relationship(id, custom))
    }

    /// Short type description used in violation messages.
    pub fn describe(&self) -> String {
        match self {
            FieldSchema::Any => "any".to_string(),
            FieldSchema::String => "string".to_string(),
            FieldSchema::Number => "number".to_string(),
            FieldSchema::Boolean => "boolean".to_string(),
            FieldSchema::Object { .. } => "object".to_string(),
            FieldSchema::List { items } => format!("[{}]", items.describe()),
            FieldSchema::Union { variants } => variants
                .iter()
                .map(|v| v.describe())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    /// Validate `value` and return its sanitized form.
    pub fn validate(&self, value: &Value, path: &mut Vec<String>) -> Result<Value, SchemaViolation> {
        match self {
            FieldSchema::Any => Ok(value.clone()),
            FieldSchema::String if value.is_string() => Ok(value.clone()),
            FieldSchema::Number if value.is_number() => Ok(value.clone()),
            FieldSchema::Boolean if value.is_boolean() => Ok(value.clone()),
            FieldSchema::Object { fields, unknown } => match value {
                Value::Object(object) => {
                    Self::validate_object(fields, *unknown, object, path).map(Value::Object)
                }
                other => Err(self.mismatch(path, Some(other))),
            },
            FieldSchema::List { items } => match value {
                Value::Array(values) => {
                    let mut sanitized = Vec::with_capacity(values.len());
                    for (index, item) in values.iter().enumerate() {
                        path.push(index.to_string());
                        let result = items.validate(item, path);
                        path.pop();
                        sanitized.push(result?);
                    }
                    Ok(Value::Array(sanitized))
                }
                other => Err(self.mismatch(path, Some(other))),
            },
            FieldSchema::Union { variants } => variants
                .iter()
                .find_map(|variant| variant.validate(value, &mut path.clone()).ok())
                .ok_or_else(|| self.mismatch(path, Some(value))),
            _ => Err(self.mismatch(path, Some(value))),
        }
    }

    fn validate_object(
        fields: &BTreeMap<String, FieldDef>,
        unknown: UnknownFields,
        object: &Map<String, Value>,
        path: &mut Vec<String>,
    ) -> Result<Map<String, Value>, SchemaViolation> {
        let mut validated = BTreeMap::new();

        for (name, def) in fields {
            path.push(name.clone());
            let result = def.validate(object.get(name), path);
            path.pop();

            if let Some(value) = result? {
                validated.insert(name.as_str(), value);
            }
        }

        // Rebuild in payload order so sanitized records keep the caller's field order
        let mut sanitized = Map::new();
        for (name, value) in object {
            if let Some(clean) = validated.remove(name.as_str()) {
                sanitized.insert(name.clone(), clean);
                continue;
            }
            if fields.contains_key(name) {
                continue;
            }
            match unknown {
                UnknownFields::Strip => {}
                UnknownFields::Keep => {
                    sanitized.insert(name.clone(), value.clone());
                }
                UnknownFields::Reject => {
                    path.push(name.clone());
                    let violation = SchemaViolation::new(
                        path,
                        format!("Unexpected field `{}` with value `{}`", name, value),
                    );
                    path.pop();
                    return Err(violation);
                }
            }
        }

        Ok(sanitized)
    }

    fn mismatch(&self, path: &[String], received: Option<&Value>) -> SchemaViolation {
        let received = match received {
            Some(value) => value.to_string(),
            None => "undefined".to_string(),
        };
        SchemaViolation::new(
            path,
            format!(
                "Expected a value of type `{}` but received `{}`",
                self.describe(),
                received
            ),
        )
    }
}

impl FieldDef {
    /// Validate a possibly-absent value. Absent optional fields yield `None`;
    /// an explicit `null` on an optional field is kept as `null`.
    pub fn validate(
        &self,
        value: Option<&Value>,
        path: &mut Vec<String>,
    ) -> Result<Option<Value>, SchemaViolation> {
        match value {
            None if self.optional => Ok(None),
            Some(Value::Null) if self.optional => Ok(Some(Value::Null)),
            None => Err(self.schema.mismatch(path, None)),
            Some(value) => self.schema.validate(value, path).map(Some),
        }
    }
}

fn default_id() -> FieldDef {
    FieldSchema::union(vec![FieldSchema::String, FieldSchema::Number]).optional()
}

fn default_main() -> FieldSchema {
    FieldSchema::any_object()
}

fn default_relationships() -> FieldSchema {
    FieldSchema::object([])
}

/// Validation shape for a whole save request: the record identifier, the
/// primary record fields and the relationship lists.
///
/// `main` and `relationships` are both validated against the same merged
/// payload; each schema narrows it to the fields it cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    #[serde(default = "default_id")]
    pub id: FieldDef,
    #[serde(default = "default_main")]
    pub main: FieldSchema,
    #[serde(default = "default_relationships")]
    pub relationships: FieldSchema,
}

impl Default for EntitySchema {
    fn default() -> Self {
        Self {
            id: default_id(),
            main: default_main(),
            relationships: default_relationships(),
        }
    }
}

impl EntitySchema {
    pub fn new(id: FieldDef, main: FieldSchema, relationships: FieldSchema) -> Self {
        Self {
            id,
            main,
            relationships,
        }
    }
}
