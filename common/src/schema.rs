// Declarative field schema for schedule entries
//
// The entry contract carries per-field storage and validation rules
// (storage type, nullability, string size, default value, immutability).
// Those rules live in one schema table here and are enforced by a single
// generic validator at the store boundary.

use crate::errors::ValidationError;
use crate::models::ScheduleEntry;
use lazy_static::lazy_static;
use regex::Regex;

/// Default value for `locale_culture_name`: the invariant locale.
pub const LOCALE_DEFAULT: &str = "";

/// Physical storage type of a schedule entry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Guid,
    /// Variable-length string with the given maximum size.
    Str(usize),
    Timestamp,
}

/// Extra validation rule attached to a field beyond type and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// Value must be a culture name ("en", "en-US", ...) or empty.
    LocaleFormat,
}

/// One row of the schema table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub default_value: Option<&'static str>,
    pub immutable: bool,
    pub rule: Option<ValidationRule>,
}

/// Schema table for `ScheduleEntry`, one row per contract field.
pub const ENTRY_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        name: "id",
        field_type: FieldType::Guid,
        nullable: false,
        default_value: None,
        immutable: true,
        rule: None,
    },
    FieldSpec {
        name: "data_type_id",
        field_type: FieldType::Guid,
        nullable: false,
        default_value: None,
        immutable: true,
        rule: None,
    },
    FieldSpec {
        name: "data_id",
        field_type: FieldType::Str(512),
        nullable: false,
        default_value: None,
        immutable: true,
        rule: None,
    },
    FieldSpec {
        name: "workflow_instance_id",
        field_type: FieldType::Guid,
        nullable: false,
        default_value: None,
        immutable: true,
        rule: None,
    },
    FieldSpec {
        name: "locale_culture_name",
        field_type: FieldType::Str(16),
        nullable: false,
        default_value: Some(LOCALE_DEFAULT),
        immutable: false,
        rule: Some(ValidationRule::LocaleFormat),
    },
    FieldSpec {
        name: "effective_at",
        field_type: FieldType::Timestamp,
        nullable: false,
        default_value: None,
        immutable: false,
        rule: None,
    },
];

lazy_static! {
    static ref LOCALE_RE: Regex =
        Regex::new(r"^$|^[A-Za-z]{2,8}(-[A-Za-z0-9]{1,8})*$").expect("valid locale regex");
}

/// String view of one entry field, as seen by the generic validator.
enum FieldValue<'a> {
    Guid,
    Timestamp,
    Str(&'a str),
}

fn field_value<'a>(entry: &'a ScheduleEntry, name: &str) -> FieldValue<'a> {
    match name {
        "data_id" => FieldValue::Str(&entry.data_id),
        "locale_culture_name" => FieldValue::Str(&entry.locale_culture_name),
        "effective_at" => FieldValue::Timestamp,
        // Uuid fields are non-null and well-formed by construction.
        _ => FieldValue::Guid,
    }
}

/// Validate an entry against the schema table.
///
/// Walks every row of [`ENTRY_SCHEMA`] and applies the generic size and
/// rule checks to the corresponding field value. Called by every store
/// implementation before an entry is persisted.
pub fn validate_entry(entry: &ScheduleEntry) -> Result<(), ValidationError> {
    for spec in ENTRY_SCHEMA {
        let value = field_value(entry, spec.name);

        if let FieldValue::Str(s) = value {
            if let FieldType::Str(max_len) = spec.field_type {
                if s.chars().count() > max_len {
                    return Err(ValidationError::InvalidFieldValue {
                        field: spec.name.to_string(),
                        reason: format!(
                            "length {} exceeds maximum {}",
                            s.chars().count(),
                            max_len
                        ),
                    });
                }
            }

            if !spec.nullable && spec.default_value.is_none() && s.is_empty() {
                return Err(ValidationError::MissingField(spec.name.to_string()));
            }

            if let Some(ValidationRule::LocaleFormat) = spec.rule {
                if !LOCALE_RE.is_match(s) {
                    return Err(ValidationError::InvalidFieldValue {
                        field: spec.name.to_string(),
                        reason: format!("'{}' is not a culture name", s),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Reject in-place mutation of immutable fields.
///
/// The store has no update operation; an entry changes by delete-and-
/// recreate. This guard backs that contract wherever a caller holds both
/// an original and a candidate replacement under the same id.
pub fn ensure_immutable_unchanged(
    original: &ScheduleEntry,
    candidate: &ScheduleEntry,
) -> Result<(), ValidationError> {
    if original.id != candidate.id {
        return Err(ValidationError::ImmutableField("id".to_string()));
    }
    if original.data_type_id != candidate.data_type_id {
        return Err(ValidationError::ImmutableField("data_type_id".to_string()));
    }
    if original.data_id != candidate.data_id {
        return Err(ValidationError::ImmutableField("data_id".to_string()));
    }
    if original.workflow_instance_id != candidate.workflow_instance_id {
        return Err(ValidationError::ImmutableField(
            "workflow_instance_id".to_string(),
        ));
    }
    Ok(())
}
