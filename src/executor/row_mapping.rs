//! Logical to physical row mapping
//!
//! A scan result walks logical rows `0..len`. Without a filter the mapping
//! is the identity; with one it lists the surviving physical rows in
//! ascending order.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMapping {
    Identity(usize),
    Selected(Vec<usize>),
}

impl RowMapping {
    pub fn identity(row_count: usize) -> Self {
        RowMapping::Identity(row_count)
    }

    /// Keeps the rows whose flag is set
    pub fn from_selection(selection: &[bool]) -> Self {
        RowMapping::Selected(
            selection
                .iter()
                .enumerate()
                .filter_map(|(row, &keep)| keep.then_some(row))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            RowMapping::Identity(count) => *count,
            RowMapping::Selected(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical row of a logical row
    pub fn get(&self, logical: usize) -> Option<usize> {
        match self {
            RowMapping::Identity(count) => (logical < *count).then_some(logical),
            RowMapping::Selected(rows) => rows.get(logical).copied(),
        }
    }

    /// Physical rows in logical order
    pub fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match self {
            RowMapping::Identity(count) => Box::new(0..*count),
            RowMapping::Selected(rows) => Box::new(rows.iter().copied()),
        }
    }
}
