//! flat_file.rs
//!
//! `;`-delimited flat tables: one row per line, no header, no quoting, lines
//! joined with `\n` and no trailing newline.

use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::info;

use crate::classify::Tables;
use crate::errors::PipelineError;
use crate::model::{District, Province, Regency, Village};

pub const DELIMITER: u8 = b';';

/// A division that maps to a fixed-width row of a named flat file.
pub trait FlatRecord: Sized {
    /// File name under the data directory
    const FILE_NAME: &'static str;
    /// Number of fields per row
    const WIDTH: usize;

    fn to_fields(&self) -> Vec<&str>;

    /// Build from a record holding at least `WIDTH` fields.
    fn from_fields(record: &StringRecord) -> Self;
}

fn field(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or_default().to_string()
}

impl FlatRecord for Province {
    const FILE_NAME: &'static str = "provinces.csv";
    const WIDTH: usize = 2;

    fn to_fields(&self) -> Vec<&str> {
        vec![&self.id, &self.name]
    }

    fn from_fields(record: &StringRecord) -> Self {
        Province {
            id: field(record, 0),
            name: field(record, 1),
        }
    }
}

impl FlatRecord for Regency {
    const FILE_NAME: &'static str = "regencies.csv";
    const WIDTH: usize = 3;

    fn to_fields(&self) -> Vec<&str> {
        vec![&self.id, &self.province_id, &self.name]
    }

    fn from_fields(record: &StringRecord) -> Self {
        Regency {
            id: field(record, 0),
            province_id: field(record, 1),
            name: field(record, 2),
        }
    }
}

impl FlatRecord for District {
    const FILE_NAME: &'static str = "districts.csv";
    const WIDTH: usize = 3;

    fn to_fields(&self) -> Vec<&str> {
        vec![&self.id, &self.regency_id, &self.name]
    }

    fn from_fields(record: &StringRecord) -> Self {
        District {
            id: field(record, 0),
            regency_id: field(record, 1),
            name: field(record, 2),
        }
    }
}

impl FlatRecord for Village {
    const FILE_NAME: &'static str = "villages.csv";
    const WIDTH: usize = 3;

    fn to_fields(&self) -> Vec<&str> {
        vec![&self.id, &self.district_id, &self.name]
    }

    fn from_fields(record: &StringRecord) -> Self {
        Village {
            id: field(record, 0),
            district_id: field(record, 1),
            name: field(record, 2),
        }
    }
}

/// Path of the flat file backing `T`.
pub fn table_path<T: FlatRecord>(data_dir: &Path) -> PathBuf {
    data_dir.join(T::FILE_NAME)
}

/// Serialize rows into the flat format, in order.
///
/// Fields are written unquoted, so a field holding the delimiter or a line
/// break would not read back as the same row; such rows are rejected.
/// `target` is only used to label errors.
pub fn encode_table<T: FlatRecord>(rows: &[T], target: &Path) -> Result<Vec<u8>, PipelineError> {
    let csv_err = |source: csv::Error| PipelineError::Csv {
        path: target.to_path_buf(),
        source,
    };
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .has_headers(false)
        .from_writer(Vec::new());

    for (idx, row) in rows.iter().enumerate() {
        let fields = row.to_fields();
        let bad = fields
            .iter()
            .find(|f| f.contains(|c: char| c == '\n' || c == '\r' || c == DELIMITER as char));
        if let Some(bad) = bad {
            return Err(PipelineError::UnencodableField {
                path: target.to_path_buf(),
                line: idx as u64 + 1,
                value: bad.to_string(),
            });
        }
        writer.write_record(fields).map_err(csv_err)?;
    }

    let mut bytes = writer
        .into_inner()
        .map_err(|e| csv_err(csv::Error::from(e.into_error())))?;
    // Rows are joined, not terminated.
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(bytes)
}

/// Parse the flat format back into rows, in file order.
///
/// Rows shorter than `T::WIDTH` are rejected; extra trailing fields are ignored.
/// `source` is only used to label errors.
pub fn decode_table<T: FlatRecord>(bytes: &[u8], source: &Path) -> Result<Vec<T>, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(bytes);

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|e| PipelineError::Csv {
                path: source.to_path_buf(),
                source: e,
            })?;
        if !more {
            break;
        }
        if record.len() < T::WIDTH {
            return Err(PipelineError::MalformedRow {
                path: source.to_path_buf(),
                line: record.position().map_or(0, |p| p.line()),
                expected: T::WIDTH,
                found: record.len(),
            });
        }
        rows.push(T::from_fields(&record));
    }
    Ok(rows)
}

/// Overwrite the flat file for `T` under `data_dir`.
pub async fn write_table<T: FlatRecord>(data_dir: &Path, rows: &[T]) -> Result<(), PipelineError> {
    let path = table_path::<T>(data_dir);
    let bytes = encode_table(rows, &path)?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;
    info!(path = %path.display(), count = rows.len(), "Wrote flat file");
    Ok(())
}

/// Read the complete flat file for `T` under `data_dir`.
pub async fn read_table<T: FlatRecord>(data_dir: &Path) -> Result<Vec<T>, PipelineError> {
    let path = table_path::<T>(data_dir);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;
    let rows = decode_table(&bytes, &path)?;
    info!(path = %path.display(), count = rows.len(), "Read flat file");
    Ok(rows)
}

/// Persist all four tables, one after another.
pub async fn write_tables(data_dir: &Path, tables: &Tables) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| PipelineError::io(data_dir, e))?;
    write_table(data_dir, &tables.provinces).await?;
    write_table(data_dir, &tables.regencies).await?;
    write_table(data_dir, &tables.districts).await?;
    write_table(data_dir, &tables.villages).await?;
    Ok(())
}

/// Load all four tables, one after another.
pub async fn read_tables(data_dir: &Path) -> Result<Tables, PipelineError> {
    Ok(Tables {
        provinces: read_table(data_dir).await?,
        regencies: read_table(data_dir).await?,
        districts: read_table(data_dir).await?,
        villages: read_table(data_dir).await?,
    })
}
