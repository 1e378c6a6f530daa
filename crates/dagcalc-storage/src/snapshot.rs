//! Snapshot record types.
//!
//! A snapshot is a compact JSON object:
//!
//! ```json
//! {"M":["description","units",ref],"G":[[id,[outs...]],...],"N":[record,...]}
//! ```
//!
//! `G` lists every vertex in insertion order with the vertices it feeds.
//! `N` holds one [`VertexRecord`] per vertex, in topological order.
//!
//! A record stores the fields of every mode; only the active mode's field
//! is populated. Inactive list fields are empty, and the scalar fields
//! (`M`, `R`) and an undefined fallback (`D`) are omitted.
//!
//! `M` is read leniently: a short array, a null, or a slot of the wrong type
//! leaves the missing metadata empty.

use dagcalc_core::{
    Band, Comparator, CoreError, DataPath, EventAccess, GraphRef, MathSource, Value, Vertex,
    VertexId, VertexMode,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SnapshotError;

/// `[description, units, reference]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotMeta(pub Option<String>, pub Option<String>, pub Option<GraphRef>);

impl<'de> Deserialize<'de> for SnapshotMeta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let slots = match Value::deserialize(deserializer)? {
            Value::Array(slots) => slots,
            _ => return Ok(SnapshotMeta::default()),
        };
        let text = |index: usize| match slots.get(index) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        Ok(SnapshotMeta(
            text(0),
            text(1),
            slots.get(2).and_then(GraphRef::from_value),
        ))
    }
}

/// A whole graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(rename = "M", default)]
    pub meta: SnapshotMeta,
    /// `[id, [ids it feeds]]` in insertion order.
    #[serde(rename = "G")]
    pub graph: Vec<(VertexId, Vec<VertexId>)>,
    /// Vertex records in topological order.
    #[serde(rename = "N")]
    pub nodes: Vec<VertexRecord>,
}

impl GraphSnapshot {
    /// Checks that every number in the snapshot survives JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NonFiniteReference`] or
    /// [`SnapshotError::NonFinite`] for the first infinity or NaN found.
    pub fn ensure_finite(&self) -> Result<(), SnapshotError> {
        if let Some(GraphRef::Number(n)) = &self.meta.2 {
            if !n.is_finite() {
                return Err(SnapshotError::NonFiniteReference);
            }
        }
        self.nodes.iter().try_for_each(VertexRecord::ensure_finite)
    }
}

/// One vertex. Field names are single letters to keep dumps small.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    /// Argument ids in order.
    #[serde(rename = "A", default)]
    pub args: Vec<VertexId>,
    /// Range: `[value, stop1, stop2, format]`.
    #[serde(rename = "B", default)]
    pub band: Vec<Value>,
    /// Comparator: `[lhs, op, rhs, format]`.
    #[serde(rename = "C", default)]
    pub comparator: Vec<Value>,
    /// Fallback.
    #[serde(rename = "D", default, skip_serializing_if = "Value::is_undefined")]
    pub fallback: Value,
    /// Enumerator pairs.
    #[serde(rename = "E", default)]
    pub enum_pairs: Vec<(Value, Value)>,
    #[serde(rename = "I")]
    pub id: VertexId,
    /// Math formula (string) or constant (number).
    #[serde(rename = "M", default, skip_serializing_if = "Option::is_none")]
    pub math: Option<Value>,
    #[serde(rename = "N", default)]
    pub name: String,
    /// Data path; `[null]` is the passthrough path.
    #[serde(rename = "P", default)]
    pub path: Vec<Value>,
    /// Rounding precision.
    #[serde(rename = "R", default, skip_serializing_if = "Option::is_none")]
    pub round: Option<f64>,
    /// Event code: `[code, access]`.
    #[serde(rename = "V", default)]
    pub event_code: Vec<Value>,
}

impl VertexRecord {
    /// Captures a vertex.
    pub fn from_vertex(vertex: &Vertex) -> Self {
        let mut record = VertexRecord {
            args: vertex.args().to_vec(),
            fallback: vertex.fallback().clone(),
            id: vertex.id(),
            name: vertex.name().to_string(),
            ..VertexRecord::default()
        };
        match vertex.mode() {
            VertexMode::Constant => {}
            VertexMode::Math(source) => record.math = Some(source.to_value()),
            VertexMode::Enumerator(pairs) => record.enum_pairs = pairs.clone(),
            VertexMode::Rounding(precision) => record.round = Some(f64::from(*precision)),
            VertexMode::Comparator(cmp) => record.comparator = cmp.to_values(),
            VertexMode::Range(band) => record.band = band.to_values(),
            VertexMode::DataPath(path) => record.path = path.to_values(),
            VertexMode::EventCode { code, access } => {
                record.event_code = vec![Value::from(*code), Value::from(access.as_str())]
            }
        }
        record
    }

    /// Checks that every number in the record survives JSON.
    ///
    /// Math constants never fail here: non-finite ones are already written
    /// as formulas.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NonFinite`] naming the first offending field.
    pub fn ensure_finite(&self) -> Result<(), SnapshotError> {
        let all_finite = |values: &[Value]| values.iter().all(is_finite);
        let fields = [
            ("D", is_finite(&self.fallback)),
            ("E", self.enum_pairs.iter().all(|(k, v)| is_finite(k) && is_finite(v))),
            ("M", self.math.as_ref().map_or(true, is_finite)),
            ("R", self.round.map_or(true, f64::is_finite)),
            ("C", all_finite(&self.comparator)),
            ("B", all_finite(&self.band)),
            ("P", all_finite(&self.path)),
            ("V", all_finite(&self.event_code)),
        ];
        match fields.into_iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(SnapshotError::NonFinite { id: self.id, field }),
            None => Ok(()),
        }
    }

    /// Rebuilds the vertex. Arguments are left to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::InvalidRecord`] if more than one mode field
    /// is populated or the populated one does not parse.
    pub fn to_vertex(&self) -> Result<Vertex, SnapshotError> {
        let invalid = |reason: String| SnapshotError::InvalidRecord {
            id: self.id,
            reason,
        };

        let mode = self.mode().map_err(invalid)?;
        let mut vertex = Vertex::with_id(self.id, self.name.clone());
        vertex.set_mode(mode).set_fallback(self.fallback.clone());
        Ok(vertex)
    }

    fn active_fields(&self) -> Vec<&'static str> {
        [
            ("M", self.math.is_some()),
            ("E", !self.enum_pairs.is_empty()),
            ("R", self.round.is_some()),
            ("P", !self.path.is_empty()),
            ("C", !self.comparator.is_empty()),
            ("B", !self.band.is_empty()),
            ("V", !self.event_code.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, active)| active.then_some(field))
        .collect()
    }

    fn mode(&self) -> Result<VertexMode, String> {
        let active = self.active_fields();
        let field = match active.as_slice() {
            [] => return Ok(VertexMode::Constant),
            [field] => *field,
            many => return Err(format!("several modes are set: {}", many.join(", "))),
        };

        let reason = |e: CoreError| e.to_string();
        Ok(match field {
            "M" => VertexMode::Math(math_source(self.math.as_ref())?),
            "E" => enumerator(&self.enum_pairs),
            "R" => rounding(self.round)?,
            "P" => VertexMode::DataPath(DataPath::from_values(&self.path).map_err(reason)?),
            "C" => {
                VertexMode::Comparator(Comparator::from_values(&self.comparator).map_err(reason)?)
            }
            "B" => VertexMode::Range(Band::from_values(&self.band).map_err(reason)?),
            _ => event_code(&self.event_code)?,
        })
    }
}

fn is_finite(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_finite(),
        Value::Array(items) => items.iter().all(is_finite),
        Value::Object(members) => members.values().all(is_finite),
        _ => true,
    }
}

fn math_source(math: Option<&Value>) -> Result<MathSource, String> {
    match math {
        Some(Value::String(s)) => Ok(MathSource::Formula(s.clone())),
        Some(Value::Number(n)) => Ok(MathSource::Constant(*n)),
        Some(other) => Err(format!(
            "math must be a formula or a number, got {}",
            other.type_name()
        )),
        None => Err("math is missing".to_string()),
    }
}

/// Replays the pairs through `add_enum` so duplicate keys collapse the same way.
fn enumerator(pairs: &[(Value, Value)]) -> VertexMode {
    let mut vertex = Vertex::with_id(VertexId::ROOT, "");
    for (key, value) in pairs {
        vertex.add_enum(key.clone(), value.clone());
    }
    vertex.mode().clone()
}

fn rounding(round: Option<f64>) -> Result<VertexMode, String> {
    match round {
        Some(p) if p.is_finite() => {
            let mut vertex = Vertex::with_id(VertexId::ROOT, "");
            vertex.set_round(p);
            Ok(vertex.mode().clone())
        }
        _ => Err("rounding precision must be a finite number".to_string()),
    }
}

fn event_code(values: &[Value]) -> Result<VertexMode, String> {
    let (code, access) = match values {
        [code] => (code, None),
        [code, access] => (code, Some(access)),
        _ => return Err(format!("event code expects 1 or 2 elements, got {}", values.len())),
    };
    let code = match code {
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => *n as i64,
        other => {
            return Err(format!(
                "event code must be an integer, got {}",
                other.to_display_string()
            ))
        }
    };
    let access = match access {
        None | Some(Value::Null) => EventAccess::default(),
        Some(Value::String(s)) => EventAccess::from_selector(s),
        Some(other) => {
            return Err(format!(
                "event access must be a string, got {}",
                other.type_name()
            ))
        }
    };
    Ok(VertexMode::EventCode { code, access })
}
