// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Keypoint CSV codec.
//!
//! The file has a fixed header `Frame,Person,Keypoint,X,Y,Prob` and one
//! CRLF-terminated row per detected keypoint:
//!
//! ```text
//! Frame,Person,Keypoint,X,Y,Prob
//! 3,0,5,100,200,0.8999999761581421
//! 3,0,6,150,200,0.800000011920929
//! ```
//!
//! `Prob` is written at double precision, so a stored `0.9` comes out as
//! `0.8999999761581421` and reads back as the same `f32`.
//!
//! Rows may appear in any frame/person order on read; the reader regroups
//! them into a [`KeypointTable`]. Either line ending is accepted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{AnnotateError, Result};
use crate::keypoints::{FrameEntry, Keypoint, KeypointTable, Person};
use crate::logging::LogSink;
use crate::results::FrameResult;
use crate::visualizer::KEYPOINT_NAMES;

/// Column names, in file order.
pub const CSV_HEADER: [&str; 6] = ["Frame", "Person", "Keypoint", "X", "Y", "Prob"];

/// Builds a [`KeypointTable`] from a detection stream and serializes it.
pub struct KeypointCsvWriter<'a> {
    log: &'a dyn LogSink,
}

impl<'a> KeypointCsvWriter<'a> {
    /// Create a writer reporting to `log`.
    #[must_use]
    pub fn new(log: &'a dyn LogSink) -> Self {
        Self { log }
    }

    /// Pull every result from `results` and collect its keypoints.
    ///
    /// Frames with zero keypoint values are left out of the table. The frame
    /// index is the result's position in the stream. Errors are returned
    /// without being logged; the caller reports them with its own context.
    ///
    /// # Errors
    ///
    /// * [`AnnotateError::MissingKeypoints`] if a result has no keypoints attribute.
    /// * [`AnnotateError::MalformedKeypoint`] if a coordinate is not representable.
    /// * Any error yielded by the stream itself, unchanged.
    pub fn extract<I>(&self, results: I) -> Result<KeypointTable>
    where
        I: IntoIterator<Item = Result<FrameResult>>,
    {
        let mut table = KeypointTable::new();

        for (frame_number, item) in results.into_iter().enumerate() {
            let frame = item?;
            let Some(keypoints) = frame.keypoints.as_ref() else {
                return Err(AnnotateError::MissingKeypoints {
                    frame: frame_number,
                });
            };
            if keypoints.num_values() == 0 {
                continue;
            }

            let mut entry = FrameEntry::new();
            let mut person_index = 0;
            for position in 0..keypoints.len() {
                let person = keypoints.person(position);
                if person.nrows() == 0 {
                    continue;
                }
                let mut stored = Person::new();
                for (keypoint_index, point) in person.outer_iter().enumerate() {
                    let values: Vec<f32> = point.iter().copied().collect();
                    let keypoint = convert_point(keypoint_index, &values).map_err(|detail| {
                        AnnotateError::MalformedKeypoint {
                            frame: frame_number,
                            detail,
                        }
                    })?;
                    stored.insert(keypoint);
                }
                entry.set_person(person_index, stored);
                person_index += 1;
            }
            table.set_frame(frame_number, entry);
        }

        Ok(table)
    }

    /// Write `table` to `csv_path_out`, replacing any existing file.
    ///
    /// An empty table produces a header-only file and a warning.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::IoWrite`] if the file cannot be created or written.
    pub fn write_table<P: AsRef<Path>>(&self, table: &KeypointTable, csv_path_out: P) -> Result<()> {
        let path = csv_path_out.as_ref();
        if table.is_empty() {
            let stem = path.with_extension("");
            self.log.warn(&format!(
                "No keypoints extracted from the '{}'",
                stem.display()
            ));
        }

        let write_err =
            |e: &dyn std::fmt::Display| AnnotateError::IoWrite(format!("Error writing to {}: {e}", path.display()));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| write_err(&e))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_path(path)
            .map_err(|e| write_err(&e))?;
        writer.write_record(CSV_HEADER).map_err(|e| write_err(&e))?;
        for (frame, person, kp) in table.records() {
            writer
                .write_record([
                    frame.to_string(),
                    person.to_string(),
                    kp.index.to_string(),
                    kp.x.to_string(),
                    kp.y.to_string(),
                    f64::from(kp.prob).to_string(),
                ])
                .map_err(|e| write_err(&e))?;
        }
        writer.flush().map_err(|e| write_err(&e))?;
        Ok(())
    }

    /// Extract keypoints from `results` and write them to `csv_path_out`.
    ///
    /// # Errors
    ///
    /// See [`Self::extract`] and [`Self::write_table`]. Nothing is written when
    /// extraction fails.
    pub fn write_keypoints_to_csv<I, P>(&self, results: I, csv_path_out: P) -> Result<KeypointTable>
    where
        I: IntoIterator<Item = Result<FrameResult>>,
        P: AsRef<Path>,
    {
        let table = self.extract(results)?;
        self.write_table(&table, csv_path_out)?;
        Ok(table)
    }
}

/// Convert one raw (x, y, confidence) triple.
fn convert_point(index: usize, point: &[f32]) -> std::result::Result<Keypoint, String> {
    let label = KEYPOINT_NAMES
        .get(index)
        .map_or_else(|| format!("keypoint {index}"), |name| format!("keypoint {index} ({name})"));
    let [x, y, prob, ..] = point else {
        return Err(format!(
            "{label} has {} values, expected x, y and confidence",
            point.len()
        ));
    };
    let x = to_pixel(*x).ok_or_else(|| format!("{label} has invalid x {x}"))?;
    let y = to_pixel(*y).ok_or_else(|| format!("{label} has invalid y {y}"))?;
    if !prob.is_finite() {
        return Err(format!("{label} has invalid probability {prob}"));
    }
    Ok(Keypoint::new(index, x, y, *prob))
}

/// Truncate a coordinate toward zero, rejecting values with no `i32` equivalent.
#[allow(clippy::cast_possible_truncation)]
fn to_pixel(value: f32) -> Option<i32> {
    let truncated = f64::from(value.trunc());
    (value.is_finite() && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&truncated))
        .then_some(truncated as i32)
}

/// Read a keypoint CSV file into a table.
///
/// # Errors
///
/// * [`AnnotateError::NotFound`] if the file does not exist.
/// * [`AnnotateError::MalformedData`] if the header is missing or wrong.
/// * [`AnnotateError::RowParse`] if any data row cannot be parsed.
pub fn read_keypoints_csv<P: AsRef<Path>>(csv_path_in: P) -> Result<KeypointTable> {
    let path = csv_path_in.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AnnotateError::NotFound(format!(
                "The specified CSV file {} was not found.",
                path.display()
            ))
        } else {
            AnnotateError::Io(e)
        }
    })?;
    parse_keypoints_csv(file)
}

/// Parse keypoint CSV content from any reader.
///
/// # Errors
///
/// See [`read_keypoints_csv`].
pub fn parse_keypoints_csv<R: Read>(source: R) -> Result<KeypointTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or_else(|| AnnotateError::MalformedData("keypoint CSV is missing its header".into()))??;
    if !header.iter().eq(CSV_HEADER) {
        return Err(AnnotateError::MalformedData(format!(
            "unexpected keypoint CSV header [{}], expected [{}]",
            header.iter().collect::<Vec<_>>().join(","),
            CSV_HEADER.join(",")
        )));
    }

    let mut table = KeypointTable::new();
    for record in records {
        let record = record?;
        let (frame, person, keypoint) = parse_row(&record)?;
        table.insert(frame, person, keypoint);
    }
    Ok(table)
}

fn parse_row(record: &csv::StringRecord) -> Result<(usize, usize, Keypoint)> {
    let row_err = |detail: String| AnnotateError::RowParse {
        row: record.iter().collect::<Vec<_>>().join(","),
        detail,
    };
    if record.len() != CSV_HEADER.len() {
        return Err(row_err(format!(
            "expected {} fields, found {}",
            CSV_HEADER.len(),
            record.len()
        )));
    }

    let index = |i: usize| -> Result<usize> {
        record[i]
            .parse::<usize>()
            .map_err(|e| row_err(format!("{}: {e}", CSV_HEADER[i])))
    };
    let coord = |i: usize| -> Result<i32> {
        record[i]
            .parse::<i32>()
            .map_err(|e| row_err(format!("{}: {e}", CSV_HEADER[i])))
    };

    let frame = index(0)?;
    let person = index(1)?;
    let keypoint = index(2)?;
    let x = coord(3)?;
    let y = coord(4)?;
    let prob = record[5]
        .parse::<f32>()
        .map_err(|e| row_err(format!("{}: {e}", CSV_HEADER[5])))?;

    Ok((frame, person, Keypoint::new(keypoint, x, y, prob)))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::logging::MemorySink;
    use proptest::prelude::*;

    fn prob() -> impl Strategy<Value = f32> {
        prop_oneof![
            Just(0.0f32),
            Just(1.0f32),
            Just(f32::from_bits(1)),
            Just(f32::MIN_POSITIVE / 4.0),
            0.0f32..=1.0,
        ]
    }

    /// Rows inserted in generated order, so persons hold sparse keypoints in
    /// whatever order they arrived.
    fn table() -> impl Strategy<Value = KeypointTable> {
        proptest::collection::vec(
            (0usize..40, 0usize..4, 0usize..17, any::<i32>(), any::<i32>(), prob()),
            0..60,
        )
        .prop_map(|rows| {
            let mut table = KeypointTable::new();
            for (frame, person, index, x, y, prob) in rows {
                table.insert(frame, person, Keypoint::new(index, x, y, prob));
            }
            table
        })
    }

    proptest! {
        #[test]
        fn prop_written_table_reads_back_unchanged(table in table()) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clip.csv");
            let log = MemorySink::new();
            let writer = KeypointCsvWriter::new(&log);

            writer.write_table(&table, &path).unwrap();
            let read_back = read_keypoints_csv(&path).unwrap();
            prop_assert_eq!(&read_back, &table);

            let first = std::fs::read(&path).unwrap();
            writer.write_table(&read_back, &path).unwrap();
            prop_assert_eq!(first, std::fs::read(&path).unwrap());
        }

        #[test]
        fn prop_every_row_ends_with_crlf(table in table()) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clip.csv");
            let log = MemorySink::new();
            KeypointCsvWriter::new(&log).write_table(&table, &path).unwrap();

            let text = std::fs::read_to_string(&path).unwrap();
            prop_assert!(text.ends_with("\r\n"));
            prop_assert_eq!(text.matches("\r\n").count(), table.keypoint_count() + 1);
            prop_assert_eq!(text.matches('\n').count(), table.keypoint_count() + 1);
        }
    }
}
