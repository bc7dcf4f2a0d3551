// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Editable, UI-describable value holders.
//!
//! A parameter exposed as a port becomes an ordinary inlet whose
//! unconnected value tracks the edited control value; a connected
//! inbound value overrides the control for the frame.

use serde::{Deserialize, Serialize};

use super::error::{PatchError, Result};
use super::value::{Value, ValueType};

/// UI widget rendered for a parameter by the editor layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Widget {
    Slider,
    InputField,
    Dropdown,
    Button,
    ColorPicker,
    FilePicker,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    label: String,
    value_type: ValueType,
    value: Value,
    min: Option<f32>,
    max: Option<f32>,
    step: Option<f32>,
    widget: Widget,
    /// Allowed discrete options, for enum-like string parameters.
    options: Vec<String>,
    changed: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, label: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value_type: value.value_type(),
            value,
            min: None,
            max: None,
            step: None,
            widget: Widget::InputField,
            options: Vec::new(),
            // New parameters count as changed so the first frame
            // propagates the default into the parameter inlet.
            changed: true,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_step(mut self, step: f32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widget = widget;
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.widget = Widget::Dropdown;
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn range(&self) -> (Option<f32>, Option<f32>) {
        (self.min, self.max)
    }

    pub fn step(&self) -> Option<f32> {
        self.step
    }

    pub fn widget(&self) -> Widget {
        self.widget
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Edit the control value. Rejects type changes and, for string
    /// parameters with a declared option set, values outside it.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        if value.value_type() != self.value_type {
            return Err(PatchError::TypeMismatch {
                expected: self.value_type.to_string(),
                actual: value.value_type().to_string(),
            });
        }

        if !self.options.is_empty() {
            match value.as_str() {
                Some(s) if self.options.iter().any(|o| o == s) => {}
                _ => {
                    return Err(PatchError::Configuration(format!(
                        "'{:?}' is not one of the allowed options for parameter '{}'",
                        value, self.name
                    )));
                }
            }
        }

        if self.value != value {
            self.value = value;
            self.changed = true;
        }
        Ok(())
    }

    /// Sync the control to a value that arrived over a connected
    /// parameter inlet. Does not raise the change flag: the inlet's
    /// own change flag already drives dirtiness for the frame.
    pub(crate) fn sync_from_port(&mut self, value: Value) {
        if value.value_type() == self.value_type {
            self.value = value;
        }
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_marks_changed() {
        let mut p = Parameter::new("gain", "Gain", Value::Float(1.0)).with_range(0.0, 2.0);
        p.clear_changed();

        p.set_value(Value::Float(1.5)).unwrap();
        assert!(p.changed());
        assert_eq!(p.value(), &Value::Float(1.5));

        p.clear_changed();
        p.set_value(Value::Float(1.5)).unwrap();
        assert!(!p.changed());
    }

    #[test]
    fn test_set_value_rejects_type_change() {
        let mut p = Parameter::new("gain", "Gain", Value::Float(1.0));
        assert!(p.set_value(Value::Int(2)).is_err());
        assert_eq!(p.value(), &Value::Float(1.0));
    }

    #[test]
    fn test_options_constrain_string_parameters() {
        let mut p = Parameter::new("op", "Operation", Value::String("add".into()))
            .with_options(vec!["add".into(), "multiply".into()]);
        p.clear_changed();

        assert!(p.set_value(Value::String("multiply".into())).is_ok());
        assert!(p.set_value(Value::String("divide".into())).is_err());
        assert_eq!(p.value().as_str(), Some("multiply"));
    }

    #[test]
    fn test_new_parameter_counts_as_changed() {
        let p = Parameter::new("count", "Count", Value::Int(2));
        assert!(p.changed());
    }
}
