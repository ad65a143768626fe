//! Mapping between a record's field map and a host form.
//!
//! The host exposes its form through [`FormSurface`]: an ordered list of
//! named controls that can be read and written by position. [`FormBridge`]
//! implements both directions on top of it.
//!
//! # Reading
//!
//! Controls are grouped by name, in document order:
//!
//! | group                         | value                              |
//! |-------------------------------|------------------------------------|
//! | text-like control(s)          | `Text` of the last control         |
//! | radio buttons                 | `Text` of the checked one, or `""` |
//! | a single checkbox             | `Bool(checked)`                    |
//! | two or more checkboxes        | `List` of checked values, in order |
//!
//! Unchecked checkboxes and radio groups are always present in the result,
//! so a saved snapshot always covers the whole form.
//!
//! # Writing
//!
//! Every named control is cleared first (text emptied, boxes unchecked) and
//! only then are the keys present in the field map applied. A record saved
//! from an older, smaller form therefore never shows values left over from
//! the previously displayed record.

use chrono::NaiveDate;

use crate::record::{FieldMap, FieldValue, Record, parse_date};

/// Kind of a form control, as far as value extraction is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Any control whose state is its text value (inputs, selects, textareas).
    Text,
    Checkbox,
    Radio,
}

impl ControlKind {
    const fn is_checkable(self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }
}

/// Current state of one named control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: String,
    pub kind: ControlKind,
    /// Text for text-like controls; the option value for checkable ones.
    pub value: String,
    pub checked: bool,
}

/// A host form, seen as an ordered list of controls.
pub trait FormSurface {
    /// Every control in document order. Controls with an empty name are
    /// ignored by the bridge.
    fn controls(&self) -> Vec<Control>;

    /// Set the text of the control at `index`.
    fn set_value(&mut self, index: usize, value: &str);

    /// Check or uncheck the control at `index`.
    fn set_checked(&mut self, index: usize, checked: bool);
}

/// Names of the two controls that feed a record's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormBridge {
    date_field: String,
    secondary_id_field: String,
}

impl Default for FormBridge {
    fn default() -> Self {
        Self::new("ticketDate", "ticketId")
    }
}

impl FormBridge {
    #[must_use]
    pub fn new(date_field: impl Into<String>, secondary_id_field: impl Into<String>) -> Self {
        Self {
            date_field: date_field.into(),
            secondary_id_field: secondary_id_field.into(),
        }
    }

    /// Pull every named control into a field map.
    #[must_use]
    pub fn read_form(&self, form: &impl FormSurface) -> FieldMap {
        let mut fields = FieldMap::new();
        for (name, group) in group_by_name(&form.controls()) {
            fields.insert(name.to_string(), read_group(&group));
        }
        fields
    }

    /// Clear the form, then push `fields` into it.
    pub fn write_form(&self, form: &mut impl FormSurface, fields: &FieldMap) {
        let controls = form.controls();

        for (idx, control) in controls.iter().enumerate() {
            if control.name.is_empty() {
                continue;
            }
            if control.kind.is_checkable() {
                form.set_checked(idx, false);
            } else {
                form.set_value(idx, "");
            }
        }

        for (name, value) in fields {
            let members: Vec<(usize, &Control)> = controls
                .iter()
                .enumerate()
                .filter(|(_, c)| &c.name == name)
                .collect();
            let Some((_, first)) = members.first() else {
                continue;
            };

            let grouped = first.kind == ControlKind::Radio
                || (first.kind == ControlKind::Checkbox && members.len() > 1);
            for (idx, control) in &members {
                if grouped {
                    form.set_checked(*idx, value.selects(&control.value));
                } else if control.kind == ControlKind::Checkbox {
                    form.set_checked(*idx, value.is_truthy());
                } else {
                    form.set_value(*idx, &value.to_string());
                }
            }
        }
    }

    /// The logical date entered in the date control, if it parses.
    #[must_use]
    pub fn read_date(&self, form: &impl FormSurface) -> Option<NaiveDate> {
        let raw = text_of(form, &self.date_field)?;
        if raw.trim().is_empty() {
            None
        } else {
            parse_date(&raw)
        }
    }

    /// The display id typed into the secondary-id control (empty if absent).
    #[must_use]
    pub fn read_secondary_id(&self, form: &impl FormSurface) -> String {
        text_of(form, &self.secondary_id_field).unwrap_or_default()
    }

    /// Show `id` in the secondary-id control.
    pub fn write_secondary_id(&self, form: &mut impl FormSurface, id: &str) {
        set_text(form, &self.secondary_id_field, id);
    }

    /// Push a whole record: fields first, then the date and display id
    /// controls.
    pub fn apply_record(&self, form: &mut impl FormSurface, record: &Record) {
        self.write_form(form, &record.fields);
        let date = record.date.map(|d| d.to_string()).unwrap_or_default();
        set_text(form, &self.date_field, &date);
        set_text(form, &self.secondary_id_field, record.display_id());
    }
}

fn group_by_name(controls: &[Control]) -> Vec<(&str, Vec<&Control>)> {
    let mut groups: Vec<(&str, Vec<&Control>)> = Vec::new();
    for control in controls.iter().filter(|c| !c.name.is_empty()) {
        match groups.iter_mut().find(|(name, _)| *name == control.name) {
            Some((_, members)) => members.push(control),
            None => groups.push((control.name.as_str(), vec![control])),
        }
    }
    groups
}

fn read_group(group: &[&Control]) -> FieldValue {
    let first = group[0];
    match first.kind {
        ControlKind::Radio => FieldValue::Text(
            group
                .iter()
                .find(|c| c.checked)
                .map(|c| c.value.clone())
                .unwrap_or_default(),
        ),
        ControlKind::Checkbox if group.len() == 1 => FieldValue::Bool(first.checked),
        ControlKind::Checkbox => FieldValue::List(
            group
                .iter()
                .filter(|c| c.checked)
                .map(|c| c.value.clone())
                .collect(),
        ),
        ControlKind::Text => FieldValue::Text(group[group.len() - 1].value.clone()),
    }
}

fn text_of(form: &impl FormSurface, name: &str) -> Option<String> {
    form.controls()
        .into_iter()
        .find(|c| c.name == name && c.kind == ControlKind::Text)
        .map(|c| c.value)
}

fn set_text(form: &mut impl FormSurface, name: &str, value: &str) {
    let targets: Vec<usize> = form
        .controls()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name == name && c.kind == ControlKind::Text)
        .map(|(idx, _)| idx)
        .collect();
    for idx in targets {
        form.set_value(idx, value);
    }
}

/// A form held entirely in memory. Useful for headless hosts and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryForm {
    controls: Vec<Control>,
}

impl MemoryForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str) -> Self {
        self.push(name, ControlKind::Text, "");
        self
    }

    #[must_use]
    pub fn checkbox(mut self, name: &str, value: &str) -> Self {
        self.push(name, ControlKind::Checkbox, value);
        self
    }

    #[must_use]
    pub fn radio(mut self, name: &str, value: &str) -> Self {
        self.push(name, ControlKind::Radio, value);
        self
    }

    fn push(&mut self, name: &str, kind: ControlKind, value: &str) {
        self.controls.push(Control {
            name: name.to_string(),
            kind,
            value: value.to_string(),
            checked: false,
        });
    }

    /// Type `value` into every text control called `name`.
    pub fn type_text(&mut self, name: &str, value: &str) {
        for control in &mut self.controls {
            if control.name == name && control.kind == ControlKind::Text {
                control.value = value.to_string();
            }
        }
    }

    /// Check or uncheck the option `value` of the checkable group `name`.
    /// Checking a radio option unchecks its siblings.
    pub fn toggle(&mut self, name: &str, value: &str, checked: bool) {
        for control in &mut self.controls {
            if control.name != name || !control.kind.is_checkable() {
                continue;
            }
            if control.value == value {
                control.checked = checked;
            } else if checked && control.kind == ControlKind::Radio {
                control.checked = false;
            }
        }
    }

    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.controls
            .iter()
            .find(|c| c.name == name && c.kind == ControlKind::Text)
            .map(|c| c.value.as_str())
    }

    #[must_use]
    pub fn is_checked(&self, name: &str, value: &str) -> bool {
        self.controls
            .iter()
            .any(|c| c.name == name && c.value == value && c.checked)
    }
}

impl FormSurface for MemoryForm {
    fn controls(&self) -> Vec<Control> {
        self.controls.clone()
    }

    fn set_value(&mut self, index: usize, value: &str) {
        if let Some(control) = self.controls.get_mut(index) {
            control.value = value.to_string();
        }
    }

    fn set_checked(&mut self, index: usize, checked: bool) {
        if let Some(control) = self.controls.get_mut(index) {
            control.checked = checked;
        }
    }
}
