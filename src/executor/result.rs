//! Scan result of one blocklet
//!
//! Exposes the decoded chunks of a blocklet through a row mapping, either
//! row by row or as column vectors. Both paths read the same rows in the
//! same order and yield the same values.
//!
//! # Row-wise contract
//!
//! The cursor starts before the first mapped row. `next_dictionary_key_array`,
//! `next_dictionary_key_integers` and `advance` move it forward one row; every
//! other row accessor reads the row the cursor points at and fails before
//! the first advance. Call one advancing accessor per row, then any number of
//! non-advancing ones.
//!
//! # Column order
//!
//! Dictionary columns come in ascending column group order, and within a
//! multi-column group in member order. Plain and complex columns follow the
//! projection. Measures follow the query.

use crate::planner::{BlockExecutionPlan, ColumnGroupKeyInfo, ResolvedMeasure};
use crate::schema::MeasureValue;

use super::chunk::BlockletChunks;
use super::errors::{ExecutorError, ExecutorResult};
use super::row_mapping::RowMapping;
use super::vector::ColumnVector;

#[derive(Debug)]
pub struct ScannedResult<'a> {
    plan: &'a BlockExecutionPlan,
    chunks: BlockletChunks,
    rows: RowMapping,
    /// Logical row of the cursor; `None` before the first advance
    cursor: Option<usize>,
    blocklet: usize,
}

impl<'a> ScannedResult<'a> {
    pub fn new(plan: &'a BlockExecutionPlan, chunks: BlockletChunks, rows: RowMapping) -> Self {
        Self {
            plan,
            chunks,
            rows,
            cursor: None,
            blocklet: plan.start_blocklet,
        }
    }

    /// Applies the plan's filter, or selects every row without one
    pub fn filtered(plan: &'a BlockExecutionPlan, chunks: BlockletChunks) -> ExecutorResult<Self> {
        let rows = match &plan.filter {
            Some(filter) => filter.apply(&chunks)?,
            None => RowMapping::identity(chunks.row_count()),
        };
        Ok(Self::new(plan, chunks, rows))
    }

    pub fn with_blocklet(mut self, blocklet: usize) -> Self {
        self.blocklet = blocklet;
        self
    }

    pub fn blocklet(&self) -> usize {
        self.blocklet
    }

    pub fn plan(&self) -> &BlockExecutionPlan {
        self.plan
    }

    pub fn row_mapping(&self) -> &RowMapping {
        &self.rows
    }

    /// Number of mapped rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_next(&self) -> bool {
        self.next_logical() < self.rows.len()
    }

    /// Moves the cursor to the next mapped row and returns its physical row
    pub fn advance(&mut self) -> ExecutorResult<usize> {
        let next = self.next_logical();
        let physical = self.rows.get(next).ok_or_else(|| {
            ExecutorError::cursor_out_of_range(format!(
                "No row {} in a result of {} rows",
                next,
                self.rows.len()
            ))
        })?;
        self.cursor = Some(next);
        Ok(physical)
    }

    /// Rewinds the cursor to before the first row
    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Drops the decoded chunks; the result is empty afterwards
    pub fn close(&mut self) {
        self.chunks = BlockletChunks::new(0);
        self.rows = RowMapping::identity(0);
        self.cursor = None;
    }

    fn next_logical(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    fn current_physical(&self) -> ExecutorResult<usize> {
        let logical = self
            .cursor
            .ok_or_else(|| ExecutorError::cursor_out_of_range("Cursor has not been advanced"))?;
        self.rows.get(logical).ok_or_else(|| {
            ExecutorError::cursor_out_of_range(format!("Cursor row {} is no longer mapped", logical))
        })
    }

    fn group_info(&self, group: usize) -> ExecutorResult<&ColumnGroupKeyInfo> {
        self.plan.column_group_key_info.get(&group).ok_or_else(|| {
            ExecutorError::decode_failed("No key layout planned for dictionary group").in_group(group)
        })
    }

    fn dictionary_key_array_at(&self, row: usize) -> ExecutorResult<Vec<u8>> {
        let mut key = Vec::with_capacity(self.plan.fixed_length_key_size);
        for &group in &self.plan.dictionary_groups {
            let chunk = self.chunks.dictionary(group)?;
            key.extend_from_slice(chunk.row(row).map_err(|e| e.in_group(group))?);
        }
        Ok(key)
    }

    fn dictionary_integers_at(&self, row: usize) -> ExecutorResult<Vec<u64>> {
        let mut codes = Vec::with_capacity(self.plan.dictionary_column_count());
        for &group in &self.plan.dictionary_groups {
            let info = self.group_info(group)?;
            let bytes = self.chunks.dictionary(group)?.row(row).map_err(|e| e.in_group(group))?;
            codes.extend(
                info.decode_selected(bytes)
                    .map_err(|e| ExecutorError::from(e).in_group(group))?,
            );
        }
        Ok(codes)
    }

    /// Advances and returns the row's dictionary group bytes, concatenated
    pub fn next_dictionary_key_array(&mut self) -> ExecutorResult<Vec<u8>> {
        let row = self.advance()?;
        self.dictionary_key_array_at(row)
    }

    /// Advances and returns the row's dictionary codes
    pub fn next_dictionary_key_integers(&mut self) -> ExecutorResult<Vec<u64>> {
        let row = self.advance()?;
        self.dictionary_integers_at(row)
    }

    /// Plain column values of the current row
    pub fn plain_key_array(&self) -> ExecutorResult<Vec<Vec<u8>>> {
        let row = self.current_physical()?;
        self.variable_row(&self.plan.plain_groups, row)
    }

    /// Plain column values of the current row as UTF-8
    pub fn plain_key_strings(&self) -> ExecutorResult<Vec<String>> {
        self.plain_key_array()?
            .into_iter()
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| ExecutorError::decode_failed(format!("Plain value is not UTF-8: {}", e)))
            })
            .collect()
    }

    /// Serialized complex values of the current row
    pub fn complex_key_array(&self) -> ExecutorResult<Vec<Vec<u8>>> {
        let row = self.current_physical()?;
        self.variable_row(&self.plan.complex_parent_groups, row)
    }

    fn variable_row(&self, groups: &[usize], row: usize) -> ExecutorResult<Vec<Vec<u8>>> {
        groups
            .iter()
            .map(|&group| {
                let chunk = self.chunks.variable(group)?;
                Ok(chunk.row(row).map_err(|e| e.in_group(group))?.to_vec())
            })
            .collect()
    }

    /// Measure values of the current row, in query order
    pub fn measure_values(&self) -> ExecutorResult<Vec<Option<MeasureValue>>> {
        let row = self.current_physical()?;
        self.plan
            .measures
            .iter()
            .map(|measure| match measure.group {
                Some(group) => {
                    let value = self.chunks.measure(group)?.value(row);
                    value
                        .and_then(|v| cast_measure(v, measure))
                        .map_err(|e| e.in_group(group))
                }
                None => cast_measure(measure.default_value, measure),
            })
            .collect()
    }

    /// Physical row id of the current row inside the blocklet
    pub fn current_row_id(&self) -> ExecutorResult<usize> {
        self.current_physical()
    }

    /// Gathers every mapped row's dictionary codes, one vector per column.
    ///
    /// Returns the number of rows appended to each vector.
    pub fn fill_dictionary_batch(&self, vectors: &mut [ColumnVector]) -> ExecutorResult<usize> {
        let needed = self.plan.dictionary_column_count();
        check_vector_count(vectors, needed, "dictionary")?;

        let mut column = 0;
        for &group in &self.plan.dictionary_groups {
            let info = self.group_info(group)?;
            let chunk = self.chunks.dictionary(group)?;
            let mut decoded = Vec::with_capacity(self.rows.len());
            for row in self.rows.iter() {
                let bytes = chunk.row(row).map_err(|e| e.in_group(group))?;
                decoded.push(
                    info.decode_selected(bytes)
                        .map_err(|e| ExecutorError::from(e).in_group(group))?,
                );
            }
            for member in 0..info.selected_count() {
                match &mut vectors[column] {
                    ColumnVector::Surrogate(values) => values.extend(decoded.iter().map(|codes| codes[member])),
                    other => return Err(family_mismatch(column, "surrogate", other)),
                }
                column += 1;
            }
        }
        Ok(self.rows.len())
    }

    /// Gathers every mapped row's plain values, one vector per column
    pub fn fill_plain_batch(&self, vectors: &mut [ColumnVector]) -> ExecutorResult<usize> {
        self.fill_variable_batch(&self.plan.plain_groups, vectors, "plain")
    }

    /// Gathers every mapped row's complex values, one vector per column
    pub fn fill_complex_batch(&self, vectors: &mut [ColumnVector]) -> ExecutorResult<usize> {
        self.fill_variable_batch(&self.plan.complex_parent_groups, vectors, "complex")
    }

    fn fill_variable_batch(
        &self,
        groups: &[usize],
        vectors: &mut [ColumnVector],
        family: &str,
    ) -> ExecutorResult<usize> {
        check_vector_count(vectors, groups.len(), family)?;
        for (column, &group) in groups.iter().enumerate() {
            let chunk = self.chunks.variable(group)?;
            let values = match &mut vectors[column] {
                ColumnVector::Bytes(values) => values,
                other => return Err(family_mismatch(column, "bytes", other)),
            };
            for row in self.rows.iter() {
                values.push(chunk.row(row).map_err(|e| e.in_group(group))?.to_vec());
            }
        }
        Ok(self.rows.len())
    }

    /// Gathers every mapped row's measures, one vector per query measure.
    ///
    /// Measures the block predates are filled with their default value.
    pub fn fill_measure_batch(&self, vectors: &mut [ColumnVector]) -> ExecutorResult<usize> {
        check_vector_count(vectors, self.plan.measures.len(), "measure")?;
        for (column, measure) in self.plan.measures.iter().enumerate() {
            let vector = &mut vectors[column];
            match measure.group {
                Some(group) => {
                    let chunk = self.chunks.measure(group)?;
                    for row in self.rows.iter() {
                        let value = chunk
                            .value(row)
                            .and_then(|v| cast_measure(v, measure))
                            .map_err(|e| e.in_group(group))?;
                        push_measure(vector, value)?;
                    }
                }
                None => {
                    let value = cast_measure(measure.default_value, measure)?;
                    for _ in 0..self.rows.len() {
                        push_measure(vector, value)?;
                    }
                }
            }
        }
        Ok(self.rows.len())
    }
}

fn check_vector_count(vectors: &[ColumnVector], needed: usize, family: &str) -> ExecutorResult<()> {
    if vectors.len() < needed {
        return Err(ExecutorError::vector_mismatch(format!(
            "{} {} columns planned but {} vectors given",
            needed,
            family,
            vectors.len()
        )));
    }
    Ok(())
}

fn family_mismatch(column: usize, expected: &str, found: &ColumnVector) -> ExecutorError {
    ExecutorError::vector_mismatch(format!(
        "Vector {} must be {}, found {}",
        column,
        expected,
        found.family()
    ))
}

/// Converts a stored or default value to the type the query asked for
fn cast_measure(value: Option<MeasureValue>, measure: &ResolvedMeasure) -> ExecutorResult<Option<MeasureValue>> {
    match value {
        None => Ok(None),
        Some(v) => v.cast(measure.data_type).map(Some).ok_or_else(|| {
            ExecutorError::decode_failed(format!(
                "Measure {} value {:?} cannot be read as {}",
                measure.column_id,
                v,
                measure.data_type.as_str()
            ))
        }),
    }
}

fn push_measure(vector: &mut ColumnVector, value: Option<MeasureValue>) -> ExecutorResult<()> {
    match (vector, value) {
        (ColumnVector::Long(target), Some(MeasureValue::Long(v))) => target.push(Some(v)),
        (ColumnVector::Double(target), Some(MeasureValue::Double(v))) => target.push(Some(v)),
        (ColumnVector::Decimal(target), Some(MeasureValue::Decimal(v))) => target.push(Some(v)),
        (ColumnVector::Long(target), None) => target.push(None),
        (ColumnVector::Double(target), None) => target.push(None),
        (ColumnVector::Decimal(target), None) => target.push(None),
        (vector, _) => {
            return Err(ExecutorError::vector_mismatch(format!(
                "Measure value does not fit a {} vector",
                vector.family()
            )))
        }
    }
    Ok(())
}
