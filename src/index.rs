// src/index.rs

use std::collections::BTreeMap;

use crate::row::Row;

/// Lookup from country to its year-ascending historical subseries, plus the
/// sorted distinct country list for UI listing.
#[derive(Debug, Clone, Default)]
pub struct SeriesIndex {
    countries: Vec<String>,
    by_country: BTreeMap<String, Vec<Row>>,
}

impl SeriesIndex {
    /// Build the index. Duplicate years within one country keep their input
    /// order (stable sort).
    pub fn build(rows: &[Row]) -> Self {
        let mut by_country: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for row in rows {
            by_country
                .entry(row.country.clone())
                .or_default()
                .push(row.clone());
        }
        for series in by_country.values_mut() {
            series.sort_by_key(|row| row.year);
        }
        let countries = by_country.keys().cloned().collect();
        Self {
            countries,
            by_country,
        }
    }

    /// Distinct country keys, lexicographically ascending.
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// All rows for `country`, year-ascending; empty for an unknown country.
    pub fn series(&self, country: &str) -> &[Row] {
        self.by_country
            .get(country)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Immutable snapshot of every valid row loaded at startup. Created once per
/// successful load and never mutated; the controller derives its working
/// series from it.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Vec<Row>,
    index: SeriesIndex,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        let index = SeriesIndex::build(&rows);
        Self { rows, index }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn index(&self) -> &SeriesIndex {
        &self.index
    }
}
