// The three linked views and their composition.
//
// Every view subscribes to the report's one `ParameterSet` and caches what
// it resolved from it (selected indicator names, brush, projection). The
// caches are refreshed on each change notification; field values are looked
// up by column name against the merged table on each evaluation. Marks are
// identified by polygon name, both here and in the exported selections.

use crate::merge::{MergedRecord, MergedTable};
use crate::params::{
    ParamObserver, ParameterSet, BRUSH, HOVER, ROTATE_LATITUDE, ROTATE_LONGITUDE, VALUE1, VALUE2,
    ZOOM,
};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use tabled::Tabled;

pub const SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
pub const DATASET: &str = "merged";
pub const MAP_VIEW: &str = "world";

/// Empty selections include every mark.
fn in_selection(selection: &BTreeSet<String>, name: Option<&str>) -> bool {
    selection.is_empty() || name.map(|n| selection.contains(n)).unwrap_or(false)
}

fn mark_name(record: &MergedRecord) -> Option<&str> {
    record.feature.name.as_deref()
}

fn subscribe<T: ParamObserver + 'static>(params: &ParameterSet, view: &Rc<T>) {
    let weak: Weak<dyn ParamObserver> = Rc::downgrade(view) as Weak<dyn ParamObserver>;
    params.subscribe(weak);
}

#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct Bar {
    #[tabled(rename = "Country")]
    pub country: String,
    #[tabled(rename = "Value")]
    pub value: f64,
}

pub struct BarChart {
    country_field: String,
    value_field: RefCell<String>,
    brush: RefCell<BTreeSet<String>>,
}

impl BarChart {
    pub fn new(params: &ParameterSet, country_field: &str) -> Rc<Self> {
        let chart = Rc::new(Self {
            country_field: country_field.to_string(),
            value_field: RefCell::new(params.text(VALUE1).unwrap_or_default()),
            brush: RefCell::new(params.selection(BRUSH)),
        });
        subscribe(params, &chart);
        chart
    }

    /// Indicator currently driving bar height.
    pub fn value_field(&self) -> String {
        self.value_field.borrow().clone()
    }

    /// One bar per brushed country with a numeric value, tallest first.
    pub fn bars(&self, data: &MergedTable) -> Vec<Bar> {
        let field = self.value_field.borrow();
        let brush = self.brush.borrow();
        let mut bars: Vec<Bar> = data
            .records
            .iter()
            .filter(|r| in_selection(&brush, mark_name(r)))
            .filter_map(|r| {
                Some(Bar {
                    country: data.country(r)?,
                    value: data.numeric(r, &field)?,
                })
            })
            .collect();
        bars.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.country.cmp(&b.country))
        });
        bars
    }

    pub fn to_vega_lite(&self) -> Value {
        json!({
            "data": {"name": DATASET},
            "mark": {"type": "bar"},
            "encoding": {
                "x": {"field": self.country_field, "type": "nominal", "sort": "-y"},
                "y": {"field": "y", "type": "quantitative", "title": "Value"},
                "color": {"field": self.country_field, "type": "nominal"},
            },
            "transform": [
                {"calculate": format!("datum[{}]", VALUE1), "as": "y"},
                {"filter": {"param": BRUSH}},
            ],
            "width": 600,
            "height": 400,
        })
    }
}

impl ParamObserver for BarChart {
    fn on_param_change(&self, params: &ParameterSet, name: &str) {
        match name {
            VALUE1 => *self.value_field.borrow_mut() = params.text(VALUE1).unwrap_or_default(),
            BRUSH => *self.brush.borrow_mut() = params.selection(BRUSH),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub country: String,
    pub x: f64,
    pub y: f64,
}

/// Value2 on x against Value1 on y.
pub struct CompareChart {
    country_field: String,
    x_field: RefCell<String>,
    y_field: RefCell<String>,
    brush: RefCell<BTreeSet<String>>,
}

impl CompareChart {
    pub fn new(params: &ParameterSet, country_field: &str) -> Rc<Self> {
        let chart = Rc::new(Self {
            country_field: country_field.to_string(),
            x_field: RefCell::new(params.text(VALUE2).unwrap_or_default()),
            y_field: RefCell::new(params.text(VALUE1).unwrap_or_default()),
            brush: RefCell::new(params.selection(BRUSH)),
        });
        subscribe(params, &chart);
        chart
    }

    pub fn points(&self, data: &MergedTable) -> Vec<ScatterPoint> {
        let x_field = self.x_field.borrow();
        let y_field = self.y_field.borrow();
        let brush = self.brush.borrow();
        data.records
            .iter()
            .filter(|r| in_selection(&brush, mark_name(r)))
            .filter_map(|r| {
                Some(ScatterPoint {
                    country: data.country(r)?,
                    x: data.numeric(r, &x_field)?,
                    y: data.numeric(r, &y_field)?,
                })
            })
            .collect()
    }

    pub fn to_vega_lite(&self) -> Value {
        json!({
            "data": {"name": DATASET},
            "mark": {"type": "point"},
            "params": [
                {"name": "compare_zoom", "select": {"type": "interval"}, "bind": "scales"},
            ],
            "encoding": {
                "x": {"field": "x", "type": "quantitative", "title": VALUE2},
                "y": {"field": "y", "type": "quantitative", "title": VALUE1},
                "color": {"field": self.country_field, "type": "nominal"},
                "shape": {"field": self.country_field, "type": "nominal"},
            },
            "transform": [
                {"calculate": format!("datum[{}]", VALUE1), "as": "y"},
                {"calculate": format!("datum[{}]", VALUE2), "as": "x"},
                {"filter": {"param": BRUSH}},
            ],
        })
    }
}

impl ParamObserver for CompareChart {
    fn on_param_change(&self, params: &ParameterSet, name: &str) {
        match name {
            VALUE1 => *self.y_field.borrow_mut() = params.text(VALUE1).unwrap_or_default(),
            VALUE2 => *self.x_field.borrow_mut() = params.text(VALUE2).unwrap_or_default(),
            BRUSH => *self.brush.borrow_mut() = params.selection(BRUSH),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Red,
    Gray,
}

impl Stroke {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stroke::Red => "red",
            Stroke::Gray => "gray",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapShape {
    pub name: Option<String>,
    pub fill: Option<f64>,
    pub stroke: Stroke,
    pub hovered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub rotate: [f64; 3],
    pub scale: f64,
    pub translate: [f64; 2],
}

pub struct WorldMap {
    country_field: String,
    fill_field: RefCell<String>,
    brush: RefCell<BTreeSet<String>>,
    hover: RefCell<BTreeSet<String>>,
    projection: RefCell<Projection>,
}

impl WorldMap {
    pub fn new(params: &ParameterSet, country_field: &str) -> Rc<Self> {
        let map = Rc::new(Self {
            country_field: country_field.to_string(),
            fill_field: RefCell::new(params.text(VALUE1).unwrap_or_default()),
            brush: RefCell::new(params.selection(BRUSH)),
            hover: RefCell::new(params.selection(HOVER)),
            projection: RefCell::new(read_projection(params)),
        });
        subscribe(params, &map);
        map
    }

    pub fn projection(&self) -> Projection {
        *self.projection.borrow()
    }

    /// One shape per polygon, matched or not.
    pub fn shapes(&self, data: &MergedTable) -> Vec<MapShape> {
        let field = self.fill_field.borrow();
        let brush = self.brush.borrow();
        let hover = self.hover.borrow();
        data.records
            .iter()
            .map(|r| {
                let name = mark_name(r);
                MapShape {
                    name: name.map(str::to_string),
                    fill: data.numeric(r, &field),
                    stroke: if in_selection(&brush, name) {
                        Stroke::Red
                    } else {
                        Stroke::Gray
                    },
                    hovered: !hover.is_empty() && in_selection(&hover, name),
                }
            })
            .collect()
    }

    pub fn to_vega_lite(&self) -> Value {
        let projection = self.projection();
        json!({
            "layer": [
                {
                    "data": {"sphere": true},
                    "mark": {"type": "geoshape", "fill": "aliceblue", "stroke": "black", "strokeWidth": 1.5},
                },
                {
                    "name": MAP_VIEW,
                    "data": {"name": DATASET},
                    "mark": {"type": "geoshape", "stroke": "black", "strokeWidth": 0.35},
                    "encoding": {
                        "color": {"field": "color", "type": "quantitative"},
                        "stroke": {"condition": {"param": BRUSH, "value": Stroke::Red.as_str()}, "value": Stroke::Gray.as_str()},
                        "strokeWidth": {"condition": {"param": HOVER, "value": 1.5, "empty": false}, "value": 0.35},
                        "tooltip": [{"field": self.country_field, "type": "nominal"}],
                    },
                    "transform": [
                        {"calculate": format!("datum[{}]", VALUE1), "as": "color"},
                    ],
                },
            ],
            "projection": {
                "type": "orthographic",
                "scale": {"expr": ZOOM},
                "rotate": {"expr": format!("[{}, {}, 0]", ROTATE_LONGITUDE, ROTATE_LATITUDE)},
                "translate": projection.translate,
            },
            "width": 400,
            "height": 400,
        })
    }
}

fn read_projection(params: &ParameterSet) -> Projection {
    Projection {
        rotate: [
            params.number(ROTATE_LONGITUDE).unwrap_or(0.0),
            params.number(ROTATE_LATITUDE).unwrap_or(0.0),
            0.0,
        ],
        scale: params.number(ZOOM).unwrap_or(100.0),
        translate: [200.0, 200.0],
    }
}

impl ParamObserver for WorldMap {
    fn on_param_change(&self, params: &ParameterSet, name: &str) {
        match name {
            VALUE1 => *self.fill_field.borrow_mut() = params.text(VALUE1).unwrap_or_default(),
            BRUSH => *self.brush.borrow_mut() = params.selection(BRUSH),
            HOVER => *self.hover.borrow_mut() = params.selection(HOVER),
            ROTATE_LONGITUDE | ROTATE_LATITUDE | ZOOM => {
                *self.projection.borrow_mut() = read_projection(params)
            }
            _ => {}
        }
    }
}

/// Map, bar chart and scatter side by side, all wired to one parameter set.
pub struct Dashboard {
    params: Rc<ParameterSet>,
    mark_field: String,
    pub map: Rc<WorldMap>,
    pub bar: Rc<BarChart>,
    pub compare: Rc<CompareChart>,
}

impl Dashboard {
    /// `mark_field` is the geo property naming each polygon; brush and
    /// hover selections pick marks by it.
    pub fn new(params: Rc<ParameterSet>, country_field: &str, mark_field: &str) -> Self {
        Self {
            map: WorldMap::new(&params, country_field),
            bar: BarChart::new(&params, country_field),
            compare: CompareChart::new(&params, country_field),
            params,
            mark_field: mark_field.to_string(),
        }
    }

    pub fn params(&self) -> &Rc<ParameterSet> {
        &self.params
    }

    /// Complete Vega-Lite document with the merged records inlined.
    pub fn to_vega_lite(&self, data: &MergedTable) -> Value {
        let mut datasets = Map::new();
        datasets.insert(DATASET.to_string(), Value::Array(data.to_values()));
        json!({
            "$schema": SCHEMA,
            "config": {"view": {"continuousWidth": 300, "continuousHeight": 300}},
            "hconcat": [
                self.map.to_vega_lite(),
                self.bar.to_vega_lite(),
                self.compare.to_vega_lite(),
            ],
            "params": self.params.to_vega_lite(MAP_VIEW, &self.mark_field),
            "datasets": datasets,
        })
    }
}
