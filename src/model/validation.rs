use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::model::{NewGroup, NewPet, NewTrait, PetFields, PetPatch, Sex};

pub const PET_NAME_MAX_LENGTH: usize = 50;
pub const SCIENTIFIC_NAME_MAX_LENGTH: usize = 50;
pub const TRAIT_NAME_MAX_LENGTH: usize = 20;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const INVALID_STRING: &str = "Not a valid string.";
const INVALID_INTEGER: &str = "A valid integer is required.";
const INVALID_NUMBER: &str = "A valid number is required.";

/// Field name to error detail.
///
/// Scalar fields carry a list of messages, `group` carries a nested map and
/// `traits` carries either a map (the value was not a list) or one map per item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Value>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(NON_FIELD_ERRORS, messages(message));
        errors
    }

    pub fn insert(&mut self, field: &str, detail: Value) {
        self.0.insert(field.to_string(), detail);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect())
    }
}

/// Validate a complete create payload.
pub fn validate_new_pet(payload: &Value) -> Result<NewPet, FieldErrors> {
    let mut schema = ObjectSchema::new(payload, false)?;

    let name = schema.required("name", |v| char_field(v, PET_NAME_MAX_LENGTH));
    let age = schema.required("age", integer_field);
    let weight = schema.required("weight", float_field);
    let sex = schema.optional("sex", choice_field);
    let group = schema.required("group", group_field);
    let traits = schema.required("traits", traits_field);

    let errors = schema.into_errors();
    if !errors.is_empty() {
        return Err(errors);
    }

    match (name, age, weight, group, traits) {
        (Some(name), Some(age), Some(weight), Some(group), Some(traits)) => Ok(NewPet {
            fields: PetFields {
                name,
                age,
                weight,
                sex: sex.unwrap_or_default(),
            },
            group,
            traits,
        }),
        _ => Err(FieldErrors::non_field("Invalid data.")),
    }
}

/// Validate a partial update payload. Absent fields are left as `None`;
/// present fields get the same checks as on create.
///
/// An empty `traits` list and a `group` object without `scientific_name`
/// count as absent, so neither touches the stored associations.
pub fn validate_pet_patch(payload: &Value) -> Result<PetPatch, FieldErrors> {
    let mut schema = ObjectSchema::new(payload, true)?;

    let patch = PetPatch {
        name: schema.required("name", |v| char_field(v, PET_NAME_MAX_LENGTH)),
        age: schema.required("age", integer_field),
        weight: schema.required("weight", float_field),
        sex: schema.optional("sex", choice_field),
        group: schema.required("group", partial_group_field).flatten(),
        traits: schema
            .required("traits", traits_field)
            .filter(|traits| !traits.is_empty()),
    };

    let errors = schema.into_errors();
    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(errors)
    }
}

struct ObjectSchema<'a> {
    object: &'a Map<String, Value>,
    partial: bool,
    errors: FieldErrors,
}

impl<'a> ObjectSchema<'a> {
    fn new(payload: &'a Value, partial: bool) -> Result<Self, FieldErrors> {
        match payload {
            Value::Object(object) => Ok(Self {
                object,
                partial,
                errors: FieldErrors::new(),
            }),
            other => Err(FieldErrors::non_field(format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(other)
            ))),
        }
    }

    fn required<T>(&mut self, name: &str, parse: impl FnOnce(&Value) -> Result<T, Value>) -> Option<T> {
        self.take(name, true, parse)
    }

    fn optional<T>(&mut self, name: &str, parse: impl FnOnce(&Value) -> Result<T, Value>) -> Option<T> {
        self.take(name, false, parse)
    }

    fn take<T>(
        &mut self,
        name: &str,
        required: bool,
        parse: impl FnOnce(&Value) -> Result<T, Value>,
    ) -> Option<T> {
        match self.object.get(name) {
            None => {
                if required && !self.partial {
                    self.errors.insert(name, messages(REQUIRED));
                }
                None
            }
            Some(Value::Null) => {
                self.errors.insert(name, messages(NOT_NULL));
                None
            }
            Some(value) => match parse(value) {
                Ok(parsed) => Some(parsed),
                Err(detail) => {
                    self.errors.insert(name, detail);
                    None
                }
            },
        }
    }

    fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

fn group_field(value: &Value) -> Result<NewGroup, Value> {
    let mut schema = ObjectSchema::new(value, false).map_err(FieldErrors::into_value)?;
    let scientific_name =
        schema.required("scientific_name", |v| char_field(v, SCIENTIFIC_NAME_MAX_LENGTH));

    let errors = schema.into_errors();
    match scientific_name {
        Some(scientific_name) if errors.is_empty() => Ok(NewGroup { scientific_name }),
        _ => Err(errors.into_value()),
    }
}

/// Inside a partial update the nested key may be left out as well
fn partial_group_field(value: &Value) -> Result<Option<NewGroup>, Value> {
    match value {
        Value::Object(object) if !object.contains_key("scientific_name") => Ok(None),
        other => group_field(other).map(Some),
    }
}

fn trait_field(value: &Value) -> Result<NewTrait, FieldErrors> {
    let mut schema = ObjectSchema::new(value, false)?;
    let name = schema.required("name", |v| char_field(v, TRAIT_NAME_MAX_LENGTH));

    let errors = schema.into_errors();
    match name {
        Some(name) if errors.is_empty() => Ok(NewTrait { name }),
        _ => Err(errors),
    }
}

fn traits_field(value: &Value) -> Result<Vec<NewTrait>, Value> {
    let Value::Array(items) = value else {
        return Err(json!({
            NON_FIELD_ERRORS: [format!(
                "Expected a list of items but got type \"{}\".",
                type_name(value)
            )]
        }));
    };

    let mut traits = Vec::with_capacity(items.len());
    let mut details = Vec::with_capacity(items.len());
    let mut failed = false;

    for item in items {
        match trait_field(item) {
            Ok(new_trait) => {
                traits.push(new_trait);
                details.push(json!({}));
            }
            Err(errors) => {
                failed = true;
                details.push(errors.into_value());
            }
        }
    }

    if failed {
        Err(Value::Array(details))
    } else {
        Ok(traits)
    }
}

/// Strings and numbers are accepted; surrounding whitespace is trimmed.
fn char_field(value: &Value, max_length: usize) -> Result<String, Value> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Err(messages(INVALID_STRING)),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(messages(NOT_BLANK));
    }
    if trimmed.chars().count() > max_length {
        return Err(messages(format!(
            "Ensure this field has no more than {} characters.",
            max_length
        )));
    }

    Ok(trimmed.to_string())
}

fn integer_field(value: &Value) -> Result<i32, Value> {
    let parsed = match value {
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(integer),
            None => number
                .as_f64()
                .filter(|float| float.is_finite() && float.fract() == 0.0)
                .map(|float| float as i64),
        },
        Value::String(text) => parse_integer_text(text),
        _ => None,
    };

    let integer = parsed.ok_or_else(|| messages(INVALID_INTEGER))?;
    if integer > i64::from(i32::MAX) {
        return Err(messages(format!(
            "Ensure this value is less than or equal to {}.",
            i32::MAX
        )));
    }
    if integer < i64::from(i32::MIN) {
        return Err(messages(format!(
            "Ensure this value is greater than or equal to {}.",
            i32::MIN
        )));
    }

    Ok(integer as i32)
}

/// Accepts "12", " 12 " and "12.000"
fn parse_integer_text(text: &str) -> Option<i64> {
    let text = text.trim();
    let digits = match text.split_once('.') {
        Some((integer, fraction)) if fraction.chars().all(|c| c == '0') => integer,
        Some(_) => return None,
        None => text,
    };
    digits.parse().ok()
}

fn float_field(value: &Value) -> Result<f64, Value> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|float| float.is_finite())
        .ok_or_else(|| messages(INVALID_NUMBER))
}

fn choice_field(value: &Value) -> Result<Sex, Value> {
    let label = match value {
        Value::String(text) => text.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    };

    Sex::parse(&label).ok_or_else(|| messages(format!("\"{}\" is not a valid choice.", label)))
}

fn messages(message: impl Into<String>) -> Value {
    Value::Array(vec![Value::String(message.into())])
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
