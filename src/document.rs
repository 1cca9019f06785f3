//! Output model: elements, identifiers and document metadata.
//!
//! Field names here are the editor's import schema and must stay stable.

use serde::Serialize;

use crate::option_set::OptionSet;
use crate::token::PathOp;

/// A resolved position in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub(crate) fn rounded(x: f64, y: f64) -> Self {
        Point {
            x: round3(x),
            y: round3(y),
        }
    }
}

/// Mirror/scale factors of a device, derived from `xscale`/`yscale` options
/// or the `mirror`/`invert` flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

/// Rounds to three decimals and folds `-0.0` to `0.0`.
pub(crate) fn round3(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// One converted circuit element. Identifiers are assigned by the
/// assembler, monotonically per kind and in submission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        position: Point,
        #[serde(skip_serializing_if = "OptionSet::is_empty")]
        options: OptionSet,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Wire {
        id: String,
        points: Vec<Point>,
        directions: Vec<PathOp>,
        #[serde(skip_serializing_if = "OptionSet::is_empty")]
        options: OptionSet,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        labels: Vec<PathLabel>,
    },
    Component {
        id: String,
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        terminals: Vec<Point>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rotation: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scale: Option<Scale>,
        #[serde(skip_serializing_if = "OptionSet::is_empty")]
        options: OptionSet,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Group {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        elements: Vec<Element>,
    },
}

/// A label attached to a path point by an inline `node` annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathLabel {
    /// Index of the path point the label hangs off.
    pub at: usize,
    pub text: String,
    #[serde(skip_serializing_if = "OptionSet::is_empty")]
    pub options: OptionSet,
}

/// Bounding box of every resolved coordinate in the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

/// The root output object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub version: String,
    pub units: String,
    pub bounds: Option<Bounds>,
    pub elements: Vec<Element>,
}

impl Document {
    /// Assigns identifiers and computes canvas bounds. Pure; writing the
    /// JSON anywhere is the caller's business.
    pub(crate) fn assemble(mut elements: Vec<Element>) -> Self {
        let mut counters = Counters::default();
        assign_ids(&mut elements, &mut counters);
        let bounds = bounds_of(&elements);
        Document {
            version: "0.1".to_owned(),
            units: "cm".to_owned(),
            bounds,
            elements,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Default)]
struct Counters {
    nodes: usize,
    wires: usize,
    components: usize,
    groups: usize,
}

fn assign_ids(elements: &mut [Element], counters: &mut Counters) {
    for element in elements {
        match element {
            Element::Node { id, .. } => {
                counters.nodes += 1;
                *id = format!("N{}", counters.nodes);
            }
            Element::Wire { id, .. } => {
                counters.wires += 1;
                *id = format!("W{}", counters.wires);
            }
            Element::Component { id, .. } => {
                counters.components += 1;
                *id = format!("C{}", counters.components);
            }
            Element::Group { id, elements, .. } => {
                counters.groups += 1;
                *id = format!("G{}", counters.groups);
                assign_ids(elements, counters);
            }
        }
    }
}

fn bounds_of(elements: &[Element]) -> Option<Bounds> {
    let mut acc = None;
    collect_bounds(elements, &mut acc);
    acc
}

fn collect_bounds(elements: &[Element], acc: &mut Option<Bounds>) {
    for element in elements {
        match element {
            Element::Node { position, .. } => extend(acc, *position),
            Element::Wire { points, .. } => {
                for point in points {
                    extend(acc, *point);
                }
            }
            Element::Component { terminals, .. } => {
                for point in terminals {
                    extend(acc, *point);
                }
            }
            Element::Group { elements, .. } => collect_bounds(elements, acc),
        }
    }
}

fn extend(acc: &mut Option<Bounds>, point: Point) {
    match acc {
        None => {
            *acc = Some(Bounds {
                min: point,
                max: point,
            })
        }
        Some(bounds) => {
            bounds.min.x = bounds.min.x.min(point.x);
            bounds.min.y = bounds.min.y.min(point.y);
            bounds.max.x = bounds.max.x.max(point.x);
            bounds.max.y = bounds.max.y.max(point.y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(x: f64, y: f64) -> Element {
        Element::Node {
            id: String::new(),
            name: None,
            position: Point { x, y },
            options: OptionSet::default(),
            label: None,
        }
    }

    #[test]
    fn ids_count_per_kind_in_order() {
        let elements = vec![
            node(0.0, 0.0),
            Element::Wire {
                id: String::new(),
                points: vec![Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 0.0 }],
                directions: vec![PathOp::Line],
                options: OptionSet::default(),
                labels: vec![],
            },
            node(2.0, 2.0),
            Element::Group {
                id: String::new(),
                name: None,
                elements: vec![node(1.0, -1.0)],
            },
        ];
        let document = Document::assemble(elements);
        let ids: Vec<&str> = document
            .elements
            .iter()
            .map(|e| match e {
                Element::Node { id, .. }
                | Element::Wire { id, .. }
                | Element::Component { id, .. }
                | Element::Group { id, .. } => id.as_str(),
            })
            .collect();
        assert_eq!(ids, vec!["N1", "W1", "N2", "G1"]);
        let Element::Group { elements, .. } = &document.elements[3] else {
            panic!("expected a group");
        };
        let Element::Node { id, .. } = &elements[0] else {
            panic!("expected a node");
        };
        assert_eq!(id, "N3");
    }

    #[test]
    fn bounds_cover_nested_groups() {
        let elements = vec![
            node(0.0, 0.0),
            Element::Group {
                id: String::new(),
                name: None,
                elements: vec![node(3.0, -2.0)],
            },
        ];
        let document = Document::assemble(elements);
        let bounds = document.bounds.unwrap();
        assert_eq!(bounds.min, Point { x: 0.0, y: -2.0 });
        assert_eq!(bounds.max, Point { x: 3.0, y: 0.0 });
    }

    #[test]
    fn empty_document_has_no_bounds() {
        let document = Document::assemble(vec![]);
        assert!(document.bounds.is_none());
        assert!(document.elements.is_empty());
    }

    #[test]
    fn round3_normalizes_negative_zero() {
        assert_eq!(round3(-0.0001), 0.0);
        assert!(round3(-0.0001).is_sign_positive());
        assert_eq!(round3(1.23456), 1.235);
    }
}
