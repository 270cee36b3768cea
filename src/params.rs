// User-adjustable bindings shared by every chart.
//
// A single `ParameterSet` is created per report. Views subscribe as
// `ParamObserver`s and are told by name whenever a value changes, so a
// dropdown change or a brush update is seen by all of them at once.

use crate::error::{ReportError, Result};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

pub const VALUE1: &str = "Value1";
pub const VALUE2: &str = "Value2";
pub const ROTATE_LONGITUDE: &str = "rotate_longitude";
pub const ROTATE_LATITUDE: &str = "rotate_latitude";
pub const ZOOM: &str = "zoom";
pub const BRUSH: &str = "brush";
pub const HOVER: &str = "hover";

pub const DEFAULT_VALUE1: &str = "Homicide rate";
pub const DEFAULT_VALUE2: &str = "Housing expenditure";

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    /// Names of the selected marks. Empty means nothing has been picked yet.
    Selection(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Dropdown { options: Vec<String> },
    Slider { min: f64, max: f64, step: f64 },
    Selection { on: Option<String>, clear: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Parameter {
    /// Identifier used inside chart expressions.
    pub name: String,
    /// Text shown next to the input widget.
    pub label: String,
    pub binding: Binding,
}

impl Parameter {
    fn validate(&self, value: &ParamValue) -> Result<()> {
        match (&self.binding, value) {
            (Binding::Dropdown { options }, ParamValue::Text(v)) => {
                if options.iter().any(|o| o == v) {
                    Ok(())
                } else {
                    Err(ReportError::Configuration(format!(
                        "'{}' is not an option of {} (options: {})",
                        v,
                        self.label,
                        options.join(", ")
                    )))
                }
            }
            (Binding::Slider { min, max, step }, ParamValue::Number(v)) => {
                let steps = (v - min) / step;
                if !(*min..=*max).contains(v) || (steps - steps.round()).abs() > 1e-9 {
                    Err(ReportError::Configuration(format!(
                        "{} must be in [{}, {}] with step {}, got {}",
                        self.label, min, max, step, v
                    )))
                } else {
                    Ok(())
                }
            }
            (Binding::Selection { .. }, ParamValue::Selection(_)) => Ok(()),
            _ => Err(ReportError::Configuration(format!(
                "value {:?} does not fit the binding of {}",
                value, self.label
            ))),
        }
    }
}

/// Implemented by views that cache values derived from parameters.
pub trait ParamObserver {
    fn on_param_change(&self, params: &ParameterSet, name: &str);
}

pub struct ParameterSet {
    params: Vec<Parameter>,
    values: RefCell<Vec<ParamValue>>,
    observers: RefCell<Vec<Weak<dyn ParamObserver>>>,
}

impl std::fmt::Debug for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterSet")
            .field("params", &self.params)
            .field("values", &self.values.borrow())
            .finish()
    }
}

impl ParameterSet {
    /// Declare the report's parameters, with both dropdowns offering every
    /// column name of the indicator table.
    ///
    /// Fails when a declared default is not a valid value, e.g. when a data
    /// refresh renamed the default indicator column.
    pub fn new(columns: &[String]) -> Result<Rc<Self>> {
        let dropdown = |name: &str| Parameter {
            name: name.to_string(),
            label: name.to_string(),
            binding: Binding::Dropdown {
                options: columns.to_vec(),
            },
        };
        let slider = |name: &str, label: &str, min: f64, max: f64| Parameter {
            name: name.to_string(),
            label: label.to_string(),
            binding: Binding::Slider { min, max, step: 5.0 },
        };
        let selection = |name: &str, on: Option<&str>, clear: Option<&str>| Parameter {
            name: name.to_string(),
            label: name.to_string(),
            binding: Binding::Selection {
                on: on.map(str::to_string),
                clear: clear.map(str::to_string),
            },
        };

        let declared = vec![
            (dropdown(VALUE1), ParamValue::Text(DEFAULT_VALUE1.to_string())),
            (dropdown(VALUE2), ParamValue::Text(DEFAULT_VALUE2.to_string())),
            (
                slider(ROTATE_LONGITUDE, "Rotate Longitude", -180.0, 180.0),
                ParamValue::Number(-10.0),
            ),
            (
                slider(ROTATE_LATITUDE, "Rotate Latitude", -180.0, 180.0),
                ParamValue::Number(-20.0),
            ),
            (slider(ZOOM, "Zoom", 100.0, 500.0), ParamValue::Number(100.0)),
            (
                selection(BRUSH, None, None),
                ParamValue::Selection(BTreeSet::new()),
            ),
            (
                selection(HOVER, Some("mouseover"), Some("mouseout")),
                ParamValue::Selection(BTreeSet::new()),
            ),
        ];

        let mut params = Vec::with_capacity(declared.len());
        let mut values = Vec::with_capacity(declared.len());
        for (param, default) in declared {
            param.validate(&default)?;
            params.push(param);
            values.push(default);
        }
        Ok(Rc::new(Self {
            params,
            values: RefCell::new(values),
            observers: RefCell::new(Vec::new()),
        }))
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ReportError::Configuration(format!("unknown parameter '{}'", name)))
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        let idx = self.index_of(name).ok()?;
        Some(self.values.borrow()[idx].clone())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn selection(&self, name: &str) -> BTreeSet<String> {
        match self.get(name) {
            Some(ParamValue::Selection(s)) => s,
            _ => BTreeSet::new(),
        }
    }

    pub fn subscribe(&self, observer: Weak<dyn ParamObserver>) {
        self.observers.borrow_mut().push(observer);
    }

    /// Validate and store a new value, then notify every live observer.
    pub fn set(&self, name: &str, value: ParamValue) -> Result<()> {
        let idx = self.index_of(name)?;
        self.params[idx].validate(&value)?;
        self.values.borrow_mut()[idx] = value;
        tracing::debug!(param = name, "parameter changed");
        self.notify(name);
        Ok(())
    }

    fn notify(&self, name: &str) {
        // Observers may read parameters back, so no borrow is held while calling them.
        let live: Vec<Rc<dyn ParamObserver>> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.on_param_change(self, name);
        }
    }

    /// Top-level Vega-Lite `params`. Selections are attached to `host_view`
    /// and identify marks by `mark_field`.
    pub fn to_vega_lite(&self, host_view: &str, mark_field: &str) -> Vec<Value> {
        let values = self.values.borrow();
        self.params
            .iter()
            .zip(values.iter())
            .map(|(param, value)| match &param.binding {
                Binding::Dropdown { options } => json!({
                    "name": param.name,
                    "value": param_value_json(value),
                    "bind": {"input": "select", "options": options, "name": param.label},
                }),
                Binding::Slider { min, max, step } => json!({
                    "name": param.name,
                    "value": param_value_json(value),
                    "bind": {"input": "range", "min": min, "max": max, "step": step, "name": param.label},
                }),
                Binding::Selection { on, clear } => {
                    let mut select = Map::new();
                    select.insert("type".to_string(), json!("point"));
                    select.insert("fields".to_string(), json!([mark_field]));
                    if let Some(on) = on {
                        select.insert("on".to_string(), json!(on));
                    }
                    if let Some(clear) = clear {
                        select.insert("clear".to_string(), json!(clear));
                    }
                    json!({
                        "name": param.name,
                        "select": Value::Object(select),
                        "views": [host_view],
                    })
                }
            })
            .collect()
    }
}

fn param_value_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Text(s) => json!(s),
        ParamValue::Number(n) => json!(n),
        ParamValue::Selection(marks) => json!(marks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn columns() -> Vec<String> {
        ["Country", DEFAULT_VALUE1, DEFAULT_VALUE2, "Life satisfaction"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn declares_defaults() {
        let params = ParameterSet::new(&columns()).unwrap();
        assert_eq!(params.text(VALUE1).as_deref(), Some(DEFAULT_VALUE1));
        assert_eq!(params.text(VALUE2).as_deref(), Some(DEFAULT_VALUE2));
        assert_eq!(params.number(ROTATE_LONGITUDE), Some(-10.0));
        assert_eq!(params.number(ROTATE_LATITUDE), Some(-20.0));
        assert_eq!(params.number(ZOOM), Some(100.0));
        assert!(params.selection(BRUSH).is_empty());
        assert!(params.selection(HOVER).is_empty());
        assert_eq!(params.params.len(), 7);
    }

    #[test]
    fn missing_default_column_fails_at_construction() {
        let cols: Vec<String> = vec!["Country".into(), DEFAULT_VALUE2.into()];
        let err = ParameterSet::new(&cols).unwrap_err();
        assert!(matches!(err, ReportError::Configuration(_)));
        assert!(err.to_string().contains(DEFAULT_VALUE1));
    }

    #[test]
    fn rejects_out_of_domain_values() {
        let params = ParameterSet::new(&columns()).unwrap();
        assert!(params
            .set(VALUE1, ParamValue::Text("Unknown".into()))
            .is_err());
        assert!(params.set(ZOOM, ParamValue::Number(50.0)).is_err());
        assert!(params.set(ZOOM, ParamValue::Number(102.0)).is_err());
        assert!(params.set(ZOOM, ParamValue::Text("big".into())).is_err());
        assert!(params.set("missing", ParamValue::Number(0.0)).is_err());
        assert_eq!(params.number(ZOOM), Some(100.0));

        params.set(ZOOM, ParamValue::Number(250.0)).unwrap();
        assert_eq!(params.number(ZOOM), Some(250.0));
    }

    struct Counter {
        seen: Cell<usize>,
        last_value1: RefCell<Option<String>>,
    }

    impl ParamObserver for Counter {
        fn on_param_change(&self, params: &ParameterSet, _name: &str) {
            self.seen.set(self.seen.get() + 1);
            *self.last_value1.borrow_mut() = params.text(VALUE1);
        }
    }

    #[test]
    fn notifies_live_observers_only() {
        let params = ParameterSet::new(&columns()).unwrap();
        let counter = Rc::new(Counter {
            seen: Cell::new(0),
            last_value1: RefCell::new(None),
        });
        let weak: Weak<dyn ParamObserver> = Rc::downgrade(&counter) as Weak<dyn ParamObserver>;
        params.subscribe(weak);

        params
            .set(VALUE1, ParamValue::Text("Life satisfaction".into()))
            .unwrap();
        assert_eq!(counter.seen.get(), 1);
        assert_eq!(
            counter.last_value1.borrow().as_deref(),
            Some("Life satisfaction")
        );

        // a rejected value is not broadcast
        assert!(params.set(VALUE1, ParamValue::Text("nope".into())).is_err());
        assert_eq!(counter.seen.get(), 1);

        drop(counter);
        let marks = ParamValue::Selection(["A".to_string()].into_iter().collect());
        params.set(BRUSH, marks).unwrap();
        assert_eq!(params.selection(BRUSH).len(), 1);
    }

    #[test]
    fn renders_bound_params() {
        let params = ParameterSet::new(&columns()).unwrap();
        let out = params.to_vega_lite("world", "name_en");
        assert_eq!(out.len(), 7);
        assert_eq!(out[0]["name"], VALUE1);
        assert_eq!(out[0]["value"], DEFAULT_VALUE1);
        assert_eq!(out[0]["bind"]["input"], "select");
        assert_eq!(out[0]["bind"]["options"].as_array().unwrap().len(), 4);
        assert_eq!(out[2]["bind"]["input"], "range");
        assert_eq!(out[2]["bind"]["name"], "Rotate Longitude");
        assert_eq!(out[4]["bind"]["min"], json!(100.0));
        assert_eq!(out[5]["select"]["type"], "point");
        assert_eq!(out[5]["views"], json!(["world"]));
        assert_eq!(out[5]["select"]["fields"], json!(["name_en"]));
        assert_eq!(out[6]["select"]["fields"], json!(["name_en"]));
        assert_eq!(out[6]["select"]["on"], "mouseover");
        assert_eq!(out[6]["select"]["clear"], "mouseout");
    }
}
