//! Column definitions
//!
//! Dimensions come in three families that decode differently under one
//! access path, so the family is a tag on the column rather than a type of
//! its own.

use serde::{Deserialize, Serialize};

/// Nested column shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplexKind {
    Array,
    Struct,
    Map,
}

impl ComplexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexKind::Array => "ARRAY",
            ComplexKind::Struct => "STRUCT",
            ComplexKind::Map => "MAP",
        }
    }
}

/// Child of a nested column. Children are stored inside the parent's column
/// group and never read on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexChild {
    pub column_id: String,
    pub name: String,
    /// Child values are dictionary codes
    pub dictionary_encoded: bool,
}

impl ComplexChild {
    pub fn new(column_id: impl Into<String>, name: impl Into<String>, dictionary_encoded: bool) -> Self {
        Self {
            column_id: column_id.into(),
            name: name.into(),
            dictionary_encoded,
        }
    }
}

/// Dimension encoding family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionKind {
    /// Fixed-width code packed into the composite key at `key_ordinal`
    Dictionary { key_ordinal: usize },
    /// Variable-width byte sequences stored on their own
    Plain,
    /// Nested value stored as byte sequences under one parent column group
    Complex {
        kind: ComplexKind,
        children: Vec<ComplexChild>,
        /// Constant element size per nesting level
        element_sizes: Vec<usize>,
    },
}

/// A dimension column as recorded in one block's schema snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionColumn {
    column_id: String,
    name: String,
    ordinal: usize,
    kind: DimensionKind,
}

impl DimensionColumn {
    pub fn new(column_id: impl Into<String>, name: impl Into<String>, ordinal: usize, kind: DimensionKind) -> Self {
        Self {
            column_id: column_id.into(),
            name: name.into(),
            ordinal,
            kind,
        }
    }

    /// Stable identity across schema versions
    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in this block's dimension list
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn kind(&self) -> &DimensionKind {
        &self.kind
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self.kind, DimensionKind::Dictionary { .. })
    }

    pub fn is_plain(&self) -> bool {
        matches!(self.kind, DimensionKind::Plain)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.kind, DimensionKind::Complex { .. })
    }

    pub fn key_ordinal(&self) -> Option<usize> {
        match self.kind {
            DimensionKind::Dictionary { key_ordinal } => Some(key_ordinal),
            _ => None,
        }
    }

    pub fn number_of_children(&self) -> usize {
        match &self.kind {
            DimensionKind::Complex { children, .. } => children.len(),
            _ => 0,
        }
    }
}

/// Numeric type tag of a measure, resolved once per query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureDataType {
    Short,
    Int,
    Long,
    Double,
    Decimal { scale: u8 },
}

impl MeasureDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureDataType::Short => "SHORT",
            MeasureDataType::Int => "INT",
            MeasureDataType::Long => "LONG",
            MeasureDataType::Double => "DOUBLE",
            MeasureDataType::Decimal { .. } => "DECIMAL",
        }
    }

    /// True for the types stored as 64-bit integers
    pub fn is_integral(&self) -> bool {
        matches!(self, MeasureDataType::Short | MeasureDataType::Int | MeasureDataType::Long)
    }
}

/// A single measure value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MeasureValue {
    Long(i64),
    Double(f64),
    /// Unscaled decimal
    Decimal(i128),
}

impl MeasureValue {
    /// Value as a double, for comparisons across numeric families
    pub fn as_f64(&self) -> f64 {
        match *self {
            MeasureValue::Long(v) => v as f64,
            MeasureValue::Double(v) => v,
            MeasureValue::Decimal(v) => v as f64,
        }
    }

    /// Value in the representation of `target`, `None` when it cannot be
    /// represented exactly. Decimals carry no scale of their own, so they
    /// only read back as decimals.
    pub fn cast(self, target: MeasureDataType) -> Option<MeasureValue> {
        match (self, target) {
            (MeasureValue::Long(v), t) if t.is_integral() => Some(MeasureValue::Long(v)),
            (MeasureValue::Long(v), MeasureDataType::Double) => Some(MeasureValue::Double(v as f64)),
            (MeasureValue::Long(v), MeasureDataType::Decimal { scale }) => 10i128
                .checked_pow(u32::from(scale))
                .and_then(|factor| i128::from(v).checked_mul(factor))
                .map(MeasureValue::Decimal),
            (MeasureValue::Double(v), t) if t.is_integral() => {
                let whole = v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64;
                whole.then_some(MeasureValue::Long(v as i64))
            }
            (MeasureValue::Double(v), MeasureDataType::Double) => Some(MeasureValue::Double(v)),
            (MeasureValue::Decimal(v), MeasureDataType::Decimal { .. }) => Some(MeasureValue::Decimal(v)),
            _ => None,
        }
    }
}

/// A measure column as recorded in one block's schema snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureColumn {
    column_id: String,
    name: String,
    ordinal: usize,
    data_type: MeasureDataType,
    default_value: Option<MeasureValue>,
}

impl MeasureColumn {
    pub fn new(
        column_id: impl Into<String>,
        name: impl Into<String>,
        ordinal: usize,
        data_type: MeasureDataType,
    ) -> Self {
        Self {
            column_id: column_id.into(),
            name: name.into(),
            ordinal,
            data_type,
            default_value: None,
        }
    }

    /// Sets the value reported for blocks written before this measure existed
    pub fn with_default(mut self, value: MeasureValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn data_type(&self) -> MeasureDataType {
        self.data_type
    }

    pub fn default_value(&self) -> Option<MeasureValue> {
        self.default_value
    }
}
