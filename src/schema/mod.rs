//! Table and block schema model
//!
//! A block carries the schema it was written with. Columns keep a stable
//! column id across schema versions; ordinals and column groups may shift.

mod column;
mod errors;
mod segment;
mod table;

pub use column::{
    ComplexChild, ComplexKind, DimensionColumn, DimensionKind, MeasureColumn, MeasureDataType,
    MeasureValue,
};
pub use errors::{SchemaError, SchemaResult};
pub use segment::{SegmentProperties, SegmentPropertiesBuilder};
pub use table::TableIdentity;
