//! Parser for the semicolon-delimited startup table.
//!
//! The upstream returns one header row followed by data rows in a fixed
//! eleven-column layout. Headers are matched by name (trimmed,
//! case-insensitive); when a header cannot be matched and the row has
//! exactly eleven columns, its position in the fixed layout is used instead.
//!
//! Rows without a startup name are dropped with a warning. Rows are never
//! deduplicated here.

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::models::StartupRecord;
use crate::normalize::{normalize_date, normalize_integer, normalize_investor_list, normalize_text};

const FENCE: &str = "```";

/// Logical columns of the table, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Website,
    Sector,
    FoundingYear,
    InvestmentAmount,
    Round,
    InvestmentDate,
    Investor,
    Description,
    FounderContact,
    Location,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::Name,
        Column::Website,
        Column::Sector,
        Column::FoundingYear,
        Column::InvestmentAmount,
        Column::Round,
        Column::InvestmentDate,
        Column::Investor,
        Column::Description,
        Column::FounderContact,
        Column::Location,
    ];

    /// The exact header text the upstream is asked to emit.
    pub fn header(self) -> &'static str {
        match self {
            Column::Name => "Nome da Startup",
            Column::Website => "Site",
            Column::Sector => "Setor",
            Column::FoundingYear => "Ano de Fundação",
            Column::InvestmentAmount => "Valor do Investimento (em reais)",
            Column::Round => "Rodada",
            Column::InvestmentDate => "Data do Investimento",
            Column::Investor => "VC Investidor",
            Column::Description => "Descrição Breve",
            Column::FounderContact => "LinkedIn do Fundador",
            Column::Location => "Localização (país)",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

/// The header row as the upstream should emit it.
pub fn header_line() -> String {
    Column::ALL
        .iter()
        .map(|c| c.header())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Removes markdown code fences (with or without a language tag) and
/// surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with(FENCE))
        .collect::<Vec<_>>()
        .join("\n")
        .replace(FENCE, "")
        .trim()
        .to_string()
}

/// Column index for every logical column, resolved against one header row.
struct Layout {
    indices: [Option<usize>; 11],
    /// True when no header matched by name and the first row is data.
    headerless: bool,
}

impl Layout {
    fn resolve(headers: &StringRecord) -> Self {
        let names: Vec<String> = headers.iter().map(header_key).collect();
        let positional = headers.len() == Column::ALL.len();

        let mut indices = [None; 11];
        let mut matched = 0;
        for column in Column::ALL {
            let wanted = header_key(column.header());
            match names.iter().position(|n| *n == wanted) {
                Some(idx) => {
                    indices[column.position()] = Some(idx);
                    matched += 1;
                }
                None if positional => indices[column.position()] = Some(column.position()),
                None => {}
            }
        }

        if matched < Column::ALL.len() {
            debug!(
                matched,
                columns = headers.len(),
                "header row only partially matched the expected layout"
            );
        }

        // With no header recognised, the first row is data only if it
        // carries a value no header cell would.
        let headerless = matched == 0
            && positional
            && (headers
                .get(Column::FoundingYear.position())
                .and_then(normalize_integer)
                .is_some()
                || headers
                    .get(Column::InvestmentDate.position())
                    .and_then(normalize_date)
                    .is_some());

        Self { indices, headerless }
    }

    fn get<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.indices[column.position()].and_then(|idx| record.get(idx))
    }

    fn build(&self, record: &StringRecord) -> Option<StartupRecord> {
        let text = |column: Column| self.get(record, column).and_then(normalize_text);

        let name = text(Column::Name)?;

        let raw_date = self.get(record, Column::InvestmentDate).unwrap_or("");
        let investment_date = normalize_date(raw_date);
        if investment_date.is_none() && !raw_date.trim().is_empty() {
            debug!(name = %name, date = raw_date, "unrecognized investment date");
        }

        Some(StartupRecord {
            website: text(Column::Website),
            sector: text(Column::Sector),
            founding_year: self
                .get(record, Column::FoundingYear)
                .and_then(normalize_integer),
            investment_amount: text(Column::InvestmentAmount),
            round_label: text(Column::Round),
            investment_date,
            investor_name: self
                .get(record, Column::Investor)
                .and_then(|v| normalize_text(&normalize_investor_list(v))),
            short_description: text(Column::Description),
            founder_contact: text(Column::FounderContact),
            location: text(Column::Location),
            name,
        })
    }
}

fn header_key(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Parses raw upstream text into candidate records, in row order.
///
/// Never fails: unreadable rows and rows without a name are skipped with a
/// warning, and text with no readable header yields an empty vector.
pub fn parse_records(raw: &str) -> Vec<StartupRecord> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Vec::new();
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            warn!(error = %e, "unreadable header row");
            return Vec::new();
        }
    };
    let layout = Layout::resolve(&headers);
    let name_header = header_key(Column::Name.header());

    let mut records = Vec::new();
    if layout.headerless {
        debug!("no header row recognised; treating first row as data");
        if let Some(rec) = layout.build(&headers) {
            records.push(rec);
        }
    }

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(row, error = %e, "skipping unreadable row");
                continue;
            }
        };

        if layout
            .get(&record, Column::Name)
            .is_some_and(|n| header_key(n) == name_header)
        {
            debug!(row, "skipping repeated header row");
            continue;
        }

        match layout.build(&record) {
            Some(rec) => records.push(rec),
            None => warn!(row, "dropping row without a startup name"),
        }
    }

    records
}
