//! Parquet I/O for chain tables.
//!
//! Tables are written in the canonical column layout; frames are read back
//! untyped so the precomputed adapter can coerce them.

use super::provider::DataError;
use crate::domain::OptionTable;
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Write a table to a Parquet file, creating parent directories.
pub fn write_table(table: &OptionTable, path: &Path) -> Result<(), DataError> {
    let mut df = table
        .to_dataframe()
        .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))?;
    write_frame(&mut df, path)
}

/// Write an arbitrary frame to a Parquet file.
pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| DataError::ParquetError(format!("create dir: {e}")))?;
    }
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    tracing::debug!(path = %path.display(), rows = df.height(), "wrote parquet");
    Ok(())
}

/// Read a Parquet file into a frame.
pub fn read_frame(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))
}
