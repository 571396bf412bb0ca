// src/row.rs

use std::collections::HashMap;

use crate::error::{Error, Result};

/// One (country, year) demographic observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub country: String,
    pub continent: String,
    pub year: i32,
    pub population: f64,
    pub life_expectancy: f64,
    pub gdp_per_capita: f64,
    pub iso_alpha: String,
    pub iso_numeric: i64,
    /// False for rows sourced from the dataset, true for oracle output.
    pub predicted: bool,
}

/// Columns the header must carry; a record missing any of these is dropped.
const ESSENTIAL_COLUMNS: &[&str] = &["country", "year", "pop"];

/// One untyped record: header column name → raw field text.
pub type RawRecord = HashMap<String, String>;

/// Split one delimited line into fields, honouring RFC-4180 quoting: commas
/// inside a quoted field are literal, and `""` inside quotes is one quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Split UTF-8 delimited text into untyped records keyed by the header row.
///
/// Fails with `ParseFailure` only when the payload as a whole is unusable
/// (no header, or the header lacks an essential column); individual bad
/// records pass through for `normalize` to drop.
pub fn parse_table(text: &str) -> Result<Vec<RawRecord>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| Error::ParseFailure("empty payload".to_string()))?;
    let headers: Vec<String> = split_fields(header_line)
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    for required in ESSENTIAL_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::ParseFailure(format!(
                "header is missing required column {:?}",
                required
            )));
        }
    }

    let records = lines
        .map(|line| {
            headers
                .iter()
                .cloned()
                .zip(split_fields(line).into_iter().map(|f| f.trim().to_string()))
                .collect()
        })
        .collect();

    Ok(records)
}

/// Convert raw records into typed rows, dropping any record that lacks
/// country, year or population. Pure and order-preserving; duplicate
/// (country, year) pairs pass through as-is.
pub fn normalize(records: &[RawRecord]) -> Vec<Row> {
    records.iter().filter_map(row_from_record).collect()
}

fn row_from_record(record: &RawRecord) -> Option<Row> {
    let country = non_empty(record, "country")?;
    let year = parse_num::<i32>(record, "year")?;
    let population = parse_num::<f64>(record, "pop").filter(|pop| *pop >= 0.0)?;

    Some(Row {
        country,
        continent: non_empty(record, "continent").unwrap_or_default(),
        year,
        population,
        life_expectancy: parse_num(record, "lifeExp").unwrap_or(0.0),
        gdp_per_capita: parse_num(record, "gdpPercap").unwrap_or(0.0),
        iso_alpha: non_empty(record, "iso_alpha").unwrap_or_default(),
        iso_numeric: parse_num(record, "iso_num").unwrap_or(0),
        predicted: false,
    })
}

fn non_empty(record: &RawRecord, key: &str) -> Option<String> {
    record
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numeric fields that fail to parse are treated as absent.
fn parse_num<T: std::str::FromStr>(record: &RawRecord, key: &str) -> Option<T> {
    record.get(key)?.trim().parse().ok()
}
