use crate::error::EngineError;
use crate::models::{Dataset, Reading};

pub const DELIMITER: u8 = b',';

/// One parsed line of the flattened table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularRow {
    pub identifier: String,
    pub label: String,
    pub signal_level: i32,
}

impl From<&Reading> for TabularRow {
    fn from(reading: &Reading) -> Self {
        Self {
            identifier: reading.identifier.clone(),
            label: reading.label.clone(),
            signal_level: reading.signal_level,
        }
    }
}

fn table_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn write_reading(
    writer: &mut csv::Writer<Vec<u8>>,
    reading: &Reading,
) -> Result<(), EngineError> {
    for value in [&reading.identifier, &reading.label] {
        if value.contains('\0') {
            return Err(EngineError::Serialization(format!(
                "field {value:?} contains a NUL character"
            )));
        }
    }

    writer
        .serialize((&reading.identifier, &reading.label, reading.signal_level))
        .map_err(|err| EngineError::Serialization(err.to_string()))
}

fn finish_table(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, EngineError> {
    writer
        .into_inner()
        .map_err(|err| EngineError::Serialization(err.to_string()))
}

/// Encode a reading as `identifier,label,level\n`.
///
/// Fields holding the delimiter, a quote or a line break are quoted with
/// inner quotes doubled. NUL cannot be carried by the text table and is
/// rejected.
pub fn encode_line(reading: &Reading) -> Result<String, EngineError> {
    let mut writer = table_writer();
    write_reading(&mut writer, reading)?;
    let bytes = finish_table(writer)?;
    String::from_utf8(bytes).map_err(|err| EngineError::Serialization(err.to_string()))
}

/// Concatenate one line per reading, round by round.
pub fn to_tabular(dataset: &Dataset) -> Result<Vec<u8>, EngineError> {
    let mut writer = table_writer();
    for reading in dataset.readings() {
        write_reading(&mut writer, reading)?;
    }
    finish_table(writer)
}

/// Parse a table produced by [`to_tabular`] back into rows.
pub fn parse_tabular(text: &str) -> Result<Vec<TabularRow>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(DELIMITER)
        .from_reader(text.as_bytes());

    reader
        .deserialize::<(String, String, i32)>()
        .map(|record| {
            let (identifier, label, signal_level) =
                record.map_err(|err| EngineError::Serialization(err.to_string()))?;
            Ok(TabularRow {
                identifier,
                label,
                signal_level,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Round;

    #[test]
    fn plain_line_has_three_fields() {
        let line = encode_line(&Reading::new("A1", "NetA", 2412, -50, "WPA2")).unwrap();
        assert_eq!(line, "A1,NetA,-50\n");
    }

    #[test]
    fn delimiter_and_quotes_are_escaped() {
        let reading = Reading::new("aa:bb", "Cafe, \"Free\"", 2412, -70, "");
        let line = encode_line(&reading).unwrap();
        assert_eq!(line, "aa:bb,\"Cafe, \"\"Free\"\"\",-70\n");

        let rows = parse_tabular(&line).unwrap();
        assert_eq!(rows, vec![TabularRow::from(&reading)]);
    }

    #[test]
    fn newline_in_label_survives_parse() {
        let reading = Reading::new("x", "two\nlines", 5180, -41, "");
        let rows = parse_tabular(&encode_line(&reading).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "two\nlines");
    }

    #[test]
    fn empty_label_and_crlf_lines_parse() {
        let rows = parse_tabular("A1,,-50\r\nB2,NetB,-61\r\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "");
        assert_eq!(rows[1].signal_level, -61);
    }

    #[test]
    fn nul_is_rejected() {
        let reading = Reading::new("x", "bad\0name", 5180, -41, "");
        assert!(matches!(
            encode_line(&reading),
            Err(EngineError::Serialization(_))
        ));
    }

    #[test]
    fn line_count_matches_reading_count() {
        let dataset = Dataset::from_rounds(vec![
            Round::new(1, vec![
                Reading::new("a", "n1", 2412, -40, ""),
                Reading::new("b", "n2", 2437, -55, ""),
            ]),
            Round::new(2, vec![]),
            Round::new(3, vec![Reading::new("a", "n1", 2412, -42, "")]),
        ])
        .unwrap();

        let table = String::from_utf8(to_tabular(&dataset).unwrap()).unwrap();
        let rows = parse_tabular(&table).unwrap();

        assert_eq!(table.lines().count(), dataset.reading_count());
        let expected: Vec<TabularRow> = dataset.readings().map(TabularRow::from).collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn malformed_rows_are_reported() {
        assert!(parse_tabular("a,b\n").is_err());
        assert!(parse_tabular("a,b,loud\n").is_err());
        assert!(parse_tabular("a,\"open,-3\n").is_err());
        assert!(parse_tabular("").unwrap().is_empty());
    }
}
