//! Core data types flowing through the ingestion pipeline.
//!
//! A [`StartupRecord`] is a candidate produced by the parser (or by an
//! interactive submission). The merge engine turns it into, or folds it
//! into, a persisted [`Startup`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize::{normalize_date, normalize_integer, normalize_text};

/// The descriptive fields of one investment event.
///
/// `None` means the source supplied nothing usable. The literal sentinel
/// [`UNKNOWN`](crate::normalize::UNKNOWN) is a value, not an absence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupRecord {
    /// Identity key for merging. Never empty in a record that reaches the
    /// merge engine.
    pub name: String,
    pub website: Option<String>,
    pub sector: Option<String>,
    pub founding_year: Option<i64>,
    /// Kept as text with its original currency formatting.
    pub investment_amount: Option<String>,
    pub round_label: Option<String>,
    pub investment_date: Option<NaiveDate>,
    /// May be a comma-joined list of investors.
    pub investor_name: Option<String>,
    pub short_description: Option<String>,
    pub founder_contact: Option<String>,
    pub location: Option<String>,
}

impl StartupRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copies every present field of `self` onto `target`, leaving fields
    /// that are absent here untouched. The name is never copied.
    pub fn overlay_onto(&self, target: &mut StartupRecord) {
        fn put<T: Clone>(src: &Option<T>, dst: &mut Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }
        put(&self.website, &mut target.website);
        put(&self.sector, &mut target.sector);
        put(&self.founding_year, &mut target.founding_year);
        put(&self.investment_amount, &mut target.investment_amount);
        put(&self.round_label, &mut target.round_label);
        put(&self.investment_date, &mut target.investment_date);
        put(&self.investor_name, &mut target.investor_name);
        put(&self.short_description, &mut target.short_description);
        put(&self.founder_contact, &mut target.founder_contact);
        put(&self.location, &mut target.location);
    }
}

/// An interactive submission, as received by `POST /entities`.
///
/// Keys may be given in snake case or as the upstream table's column
/// headers. The date is free text and is coerced on conversion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStartup {
    #[serde(alias = "Nome da Startup")]
    pub name: String,
    #[serde(default, alias = "Site")]
    pub website: Option<String>,
    #[serde(default, alias = "Setor")]
    pub sector: Option<String>,
    #[serde(default, alias = "Ano de Fundação", deserialize_with = "lenient_year")]
    pub founding_year: Option<i64>,
    #[serde(default, alias = "Valor do Investimento (em reais)")]
    pub investment_amount: Option<String>,
    #[serde(default, alias = "Rodada")]
    pub round_label: Option<String>,
    #[serde(default, alias = "Data do Investimento")]
    pub investment_date: Option<String>,
    #[serde(default, alias = "VC Investidor")]
    pub investor_name: Option<String>,
    #[serde(default, alias = "Descrição Breve")]
    pub short_description: Option<String>,
    #[serde(default, alias = "LinkedIn do Fundador")]
    pub founder_contact: Option<String>,
    #[serde(default, alias = "Localização (país)")]
    pub location: Option<String>,
}

impl NewStartup {
    /// Trims text fields, drops blank ones and parses the date. Returns
    /// `None` when the name is blank.
    pub fn into_record(self) -> Option<StartupRecord> {
        let text = |v: Option<String>| v.as_deref().and_then(normalize_text);
        Some(StartupRecord {
            name: normalize_text(&self.name)?,
            website: text(self.website),
            sector: text(self.sector),
            founding_year: self.founding_year,
            investment_amount: text(self.investment_amount),
            round_label: text(self.round_label),
            investment_date: self.investment_date.as_deref().and_then(normalize_date),
            investor_name: text(self.investor_name),
            short_description: text(self.short_description),
            founder_contact: text(self.founder_contact),
            location: text(self.location),
        })
    }
}

/// Accepts a year as a JSON number or as digit-only text.
fn lenient_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Year>::deserialize(deserializer)? {
        Some(Year::Number(year)) => Some(year),
        Some(Year::Text(text)) => normalize_integer(&text),
        None => None,
    })
}

/// A durable row in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Startup {
    /// Surrogate key assigned by the store.
    pub id: i64,
    #[serde(flatten)]
    pub fields: StartupRecord,
    pub updated_at: DateTime<Utc>,
}
