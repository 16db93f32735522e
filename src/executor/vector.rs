//! Column vectors filled by columnar materialization

use crate::schema::{MeasureDataType, MeasureValue};

/// Growable output column of one family
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnVector {
    /// Dictionary codes
    Surrogate(Vec<u64>),
    /// Plain values or serialized complex values
    Bytes(Vec<Vec<u8>>),
    Long(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Decimal(Vec<Option<i128>>),
}

impl ColumnVector {
    pub fn surrogate() -> Self {
        ColumnVector::Surrogate(Vec::new())
    }

    pub fn bytes() -> Self {
        ColumnVector::Bytes(Vec::new())
    }

    /// Empty vector of the family a measure type materializes into
    pub fn for_measure(data_type: MeasureDataType) -> Self {
        match data_type {
            MeasureDataType::Short | MeasureDataType::Int | MeasureDataType::Long => {
                ColumnVector::Long(Vec::new())
            }
            MeasureDataType::Double => ColumnVector::Double(Vec::new()),
            MeasureDataType::Decimal { .. } => ColumnVector::Decimal(Vec::new()),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            ColumnVector::Surrogate(_) => "surrogate",
            ColumnVector::Bytes(_) => "bytes",
            ColumnVector::Long(_) => "long",
            ColumnVector::Double(_) => "double",
            ColumnVector::Decimal(_) => "decimal",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnVector::Surrogate(v) => v.len(),
            ColumnVector::Bytes(v) => v.len(),
            ColumnVector::Long(v) => v.len(),
            ColumnVector::Double(v) => v.len(),
            ColumnVector::Decimal(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Measure value at a row, for comparing with row-wise output
    pub fn measure_at(&self, row: usize) -> Option<MeasureValue> {
        match self {
            ColumnVector::Long(v) => v.get(row).copied().flatten().map(MeasureValue::Long),
            ColumnVector::Double(v) => v.get(row).copied().flatten().map(MeasureValue::Double),
            ColumnVector::Decimal(v) => v.get(row).copied().flatten().map(MeasureValue::Decimal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_measure_families() {
        assert_eq!(ColumnVector::for_measure(MeasureDataType::Int).family(), "long");
        assert_eq!(ColumnVector::for_measure(MeasureDataType::Double).family(), "double");
        assert_eq!(
            ColumnVector::for_measure(MeasureDataType::Decimal { scale: 2 }).family(),
            "decimal"
        );
    }

    #[test]
    fn test_measure_at() {
        let vector = ColumnVector::Long(vec![Some(3), None]);
        assert_eq!(vector.measure_at(0), Some(MeasureValue::Long(3)));
        assert_eq!(vector.measure_at(1), None);
        assert!(ColumnVector::surrogate().is_empty());
    }
}
