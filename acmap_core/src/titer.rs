use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TiterError {
    #[error("empty titer cell")]
    Empty,
    #[error("unparseable titer value {0:?}")]
    BadNumber(String),
    #[error("titer value {0} must be positive")]
    NonPositive(f64),
    #[error("titer row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
    #[error("titer table has {got} rows, expected {expected}")]
    RowCount { got: usize, expected: usize },
}

/// One cell of the antigen x serum table. The payload is the log titer
/// (`log2(value / 10)`), so distance math never re-parses the raw string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Titer {
    Measured(f64),
    LessThan(f64),
    MoreThan(f64),
    NotTested,
}

impl Titer {
    /// Parses a raw table cell: a bare number, `<N`, `>N`, or `*`.
    pub fn parse(raw: &str) -> Result<Titer, TiterError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TiterError::Empty);
        }
        if trimmed == "*" {
            return Ok(Titer::NotTested);
        }
        let (rest, build): (&str, fn(f64) -> Titer) =
            if let Some(rest) = trimmed.strip_prefix('<') {
                (rest, Titer::LessThan)
            } else if let Some(rest) = trimmed.strip_prefix('>') {
                (rest, Titer::MoreThan)
            } else {
                (trimmed, Titer::Measured)
            };
        let value: f64 = rest
            .trim()
            .parse()
            .map_err(|_| TiterError::BadNumber(raw.to_string()))?;
        if value <= 0.0 {
            return Err(TiterError::NonPositive(value));
        }
        Ok(build((value / 10.0).log2()))
    }

    /// Log titer, or `None` for a non-detectable cell.
    pub fn log_titer(self) -> Option<f64> {
        match self {
            Titer::Measured(log) | Titer::LessThan(log) | Titer::MoreThan(log) => Some(log),
            Titer::NotTested => None,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, Titer::Measured(_))
    }

    pub fn is_thresholded(self) -> bool {
        matches!(self, Titer::LessThan(_) | Titer::MoreThan(_))
    }

    /// Whether this cell participates in stress and line rendering at all.
    pub fn contributes(self) -> bool {
        !matches!(self, Titer::NotTested)
    }
}

/// Dense antigens x sera titer grid. Keeps the originally loaded value per
/// cell so interactive edits can be undone with `restore`.
#[derive(Debug, Clone)]
pub struct TiterTable {
    antigens: usize,
    sera: usize,
    cells: Vec<Titer>,
    loaded: Vec<Titer>,
}

impl TiterTable {
    pub fn new(antigens: usize, sera: usize) -> Self {
        let cells = vec![Titer::NotTested; antigens * sera];
        Self {
            antigens,
            sera,
            loaded: cells.clone(),
            cells,
        }
    }

    /// Builds a table from raw string rows (one row per antigen). A ragged
    /// matrix is a structural error; an unparseable individual cell degrades
    /// to `NotTested` with a warning, per the graceful-degradation rule.
    pub fn from_rows(rows: &[Vec<String>], antigens: usize, sera: usize) -> Result<Self, TiterError> {
        if rows.len() != antigens {
            return Err(TiterError::RowCount {
                got: rows.len(),
                expected: antigens,
            });
        }
        let mut table = Self::new(antigens, sera);
        for (ag, row) in rows.iter().enumerate() {
            if row.len() != sera {
                return Err(TiterError::RaggedRow {
                    row: ag,
                    got: row.len(),
                    expected: sera,
                });
            }
            for (sr, raw) in row.iter().enumerate() {
                let titer = match Titer::parse(raw) {
                    Ok(titer) => titer,
                    Err(err) => {
                        log::warn!(
                            "titer cell [{ag}][{sr}] {raw:?} rejected ({err}); treating as not tested"
                        );
                        Titer::NotTested
                    }
                };
                table.cells[ag * sera + sr] = titer;
            }
        }
        table.loaded = table.cells.clone();
        Ok(table)
    }

    pub fn antigen_count(&self) -> usize {
        self.antigens
    }

    pub fn serum_count(&self) -> usize {
        self.sera
    }

    pub fn get(&self, antigen: usize, serum: usize) -> Titer {
        self.cells[self.cell_index(antigen, serum)]
    }

    pub fn set(&mut self, antigen: usize, serum: usize, titer: Titer) {
        let idx = self.cell_index(antigen, serum);
        self.cells[idx] = titer;
    }

    /// Reverts an edited cell to its originally loaded value and returns it.
    pub fn restore(&mut self, antigen: usize, serum: usize) -> Titer {
        let idx = self.cell_index(antigen, serum);
        self.cells[idx] = self.loaded[idx];
        self.cells[idx]
    }

    /// Per-serum column basis: the maximum log titer in the column. Cells
    /// that were never tested do not count; an empty column yields 0.
    pub fn column_basis(&self, serum: usize) -> f64 {
        assert!(serum < self.sera, "serum index {serum} out of range");
        (0..self.antigens)
            .filter_map(|ag| self.get(ag, serum).log_titer())
            .fold(0.0_f64, f64::max)
    }

    fn cell_index(&self, antigen: usize, serum: usize) -> usize {
        assert!(
            antigen < self.antigens && serum < self.sera,
            "titer cell [{antigen}][{serum}] out of range ({}x{})",
            self.antigens,
            self.sera
        );
        antigen * self.sera + serum
    }
}

#[cfg(test)]
mod titer_parse_tests {
    use super::*;

    #[test]
    fn measured_titers_carry_the_log_transform() {
        let titer = Titer::parse("40").expect("measured");
        assert_eq!(titer, Titer::Measured(2.0));
        assert_eq!(titer.log_titer(), Some(2.0));
    }

    #[test]
    fn thresholded_titers_keep_their_side() {
        assert_eq!(Titer::parse("<40").expect("less-than"), Titer::LessThan(2.0));
        assert_eq!(Titer::parse(">1280").expect("more-than"), Titer::MoreThan(7.0));
    }

    #[test]
    fn star_is_not_tested() {
        let titer = Titer::parse("*").expect("star");
        assert_eq!(titer, Titer::NotTested);
        assert!(!titer.contributes());
        assert_eq!(titer.log_titer(), None);
    }

    #[test]
    fn malformed_cells_are_rejected() {
        assert_eq!(Titer::parse(""), Err(TiterError::Empty));
        assert!(matches!(Titer::parse("forty"), Err(TiterError::BadNumber(_))));
        assert_eq!(Titer::parse("-20"), Err(TiterError::NonPositive(-20.0)));
    }
}
