//! Dynamic per-step template fields.
//!
//! The backend describes each field with a `tipo` discriminant. Only the kinds
//! below are accepted; an unknown `tipo` fails to decode instead of falling
//! through to a default widget.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::gateway::TemplateValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemPreset {
    CurrentUser,
    CurrentDate,
    TicketId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "kebab-case")]
pub enum TemplateFieldKind {
    Text,
    Date,
    Textarea,
    /// Value picked from a server-side lookup; `source` names the lookup
    AsyncLookup { source: String },
    /// Filled by the client from session/ticket context, never typed by the user
    SystemPreset { preset: SystemPreset },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: TemplateFieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateFieldError {
    #[error("Field '{label}' is required")]
    Missing { field_id: u64, label: String },
    #[error("Field '{label}' expects a date as YYYY-MM-DD, got '{value}'")]
    InvalidDate { field_id: u64, label: String, value: String },
    #[error("No template field with id {0} on this step")]
    UnknownField(u64),
}

/// Context system presets are resolved from
#[derive(Debug, Clone)]
pub struct PresetContext<'a> {
    pub user_name: &'a str,
    pub ticket_id: u64,
    pub today: NaiveDate,
}

impl TemplateField {
    pub fn is_user_editable(&self) -> bool {
        !matches!(self.kind, TemplateFieldKind::SystemPreset { .. })
    }

    fn preset_value(preset: SystemPreset, ctx: &PresetContext<'_>) -> String {
        match preset {
            SystemPreset::CurrentUser => ctx.user_name.to_string(),
            SystemPreset::CurrentDate => ctx.today.format("%Y-%m-%d").to_string(),
            SystemPreset::TicketId => ctx.ticket_id.to_string(),
        }
    }

    /// Resolve the value to submit for this field
    pub fn resolve(&self, entered: Option<&str>, ctx: &PresetContext<'_>) -> Result<String, TemplateFieldError> {
        if let TemplateFieldKind::SystemPreset { preset } = self.kind {
            return Ok(Self::preset_value(preset, ctx));
        }

        let value = entered.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            if self.required {
                return Err(TemplateFieldError::Missing {
                    field_id: self.id,
                    label: self.label.clone(),
                });
            }
            return Ok(String::new());
        }

        if self.kind == TemplateFieldKind::Date && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
            return Err(TemplateFieldError::InvalidDate {
                field_id: self.id,
                label: self.label.clone(),
                value: value.to_string(),
            });
        }

        Ok(value.to_string())
    }
}

/// Build one `{fieldId, value}` pair per configured field.
///
/// Fails on the first missing or malformed field, or on a value entered for a
/// field the step does not define.
pub fn collect_values(
    fields: &[TemplateField],
    entered: &BTreeMap<u64, String>,
    ctx: &PresetContext<'_>,
) -> Result<Vec<TemplateValue>, TemplateFieldError> {
    if let Some(unknown) = entered.keys().find(|id| !fields.iter().any(|f| f.id == **id)) {
        return Err(TemplateFieldError::UnknownField(*unknown));
    }

    fields
        .iter()
        .map(|field| -> Result<TemplateValue, TemplateFieldError> {
            let value = field.resolve(entered.get(&field.id).map(String::as_str), ctx)?;
            Ok(TemplateValue {
                field_id: field.id,
                value,
            })
        })
        .collect()
}
