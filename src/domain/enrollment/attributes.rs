use chrono::{Datelike, Months, NaiveDate, Utc};

use super::{
    errors::InfoError,
    models::{
        CredentialAttributes, CredentialIdentifier, CredentialList, DocumentRecord, DocumentType,
        EdlRecord, PassportRecord,
    },
    names::{split_family_name, to_title_case},
};

pub const DEFAULT_SCHEME_MANAGER: &str = "irma-demo";
pub const DEFAULT_ISSUER: &str = "MijnOverheid";

const AGE_LOWER: &str = "ageLower";
const AGE_HIGHER: &str = "ageHigher";
const FULL_NAME: &str = "fullName";
const ID_DOCUMENT: &str = "idDocument";

const LOWER_THRESHOLDS: [u32; 4] = [12, 16, 18, 21];
const HIGHER_THRESHOLDS: [u32; 4] = [50, 60, 65, 75];

/// Two-digit years resolve into [today - 80y, today + 20y).
const YEARS_BEHIND: u32 = 80;
const YEARS_AHEAD: u32 = 20;

/// The fields every document type must yield before attributes can be built.
struct Holder {
    date_of_birth: NaiveDate,
    date_of_expiry: NaiveDate,
    family_name: String,
    given_names: Vec<String>,
    number: String,
    nationality: String,
    kind: DocumentType,
}

/// Turns verified documents into the credentials offered to their holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDeriver {
    scheme_manager: String,
    issuer: String,
}

impl Default for AttributeDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEME_MANAGER, DEFAULT_ISSUER)
    }
}

impl AttributeDeriver {
    pub fn new(scheme_manager: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            scheme_manager: scheme_manager.into(),
            issuer: issuer.into(),
        }
    }

    /// Identifier of `credential` under the configured scheme manager and issuer.
    pub fn credential_id(&self, credential: &str) -> CredentialIdentifier {
        CredentialIdentifier::new(&self.scheme_manager, &self.issuer, credential)
    }

    /// Derives the credential list using the current UTC date.
    pub fn derive(&self, record: &DocumentRecord) -> Result<CredentialList, InfoError> {
        self.derive_at(record, Utc::now().date_naive())
    }

    /// Derives the credential list as it would be on `today`.
    pub fn derive_at(
        &self,
        record: &DocumentRecord,
        today: NaiveDate,
    ) -> Result<CredentialList, InfoError> {
        let holder = match record {
            DocumentRecord::Passport(passport) => passport_holder(passport, today)?,
            DocumentRecord::DrivingLicence(edl) => licence_holder(edl)?,
        };

        let mut list = CredentialList::new();
        list.insert(
            self.credential_id(AGE_LOWER),
            age_attributes(holder.date_of_birth, today, &LOWER_THRESHOLDS),
        );
        list.insert(
            self.credential_id(AGE_HIGHER),
            age_attributes(holder.date_of_birth, today, &HIGHER_THRESHOLDS),
        );
        list.insert(self.credential_id(FULL_NAME), name_attributes(&holder)?);
        list.insert(self.credential_id(ID_DOCUMENT), document_attributes(&holder));
        Ok(list)
    }
}

fn passport_holder(passport: &PassportRecord, today: NaiveDate) -> Result<Holder, InfoError> {
    Ok(Holder {
        date_of_birth: parse_short_date("date of birth", &passport.date_of_birth, today)?,
        date_of_expiry: parse_short_date("date of expiry", &passport.date_of_expiry, today)?,
        family_name: passport.primary_identifier.clone(),
        given_names: passport
            .secondary_identifiers
            .iter()
            .flat_map(|name| name.split_whitespace())
            .map(str::to_string)
            .collect(),
        number: passport.document_number.trim().to_string(),
        nationality: passport.nationality.trim().to_string(),
        kind: DocumentType::from_mrz_code(&passport.document_code),
    })
}

fn licence_holder(edl: &EdlRecord) -> Result<Holder, InfoError> {
    Ok(Holder {
        date_of_birth: parse_long_date("date of birth", &edl.date_of_birth)?,
        date_of_expiry: parse_long_date("date of expiry", &edl.date_of_expiry)?,
        family_name: edl.family_name.clone(),
        given_names: edl
            .given_names
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        number: edl.document_number.trim().to_string(),
        nationality: edl.issuing_member_state.trim().to_string(),
        kind: DocumentType::DrivingLicence,
    })
}

fn age_attributes(dob: NaiveDate, today: NaiveDate, thresholds: &[u32]) -> CredentialAttributes {
    thresholds
        .iter()
        .map(|&years| {
            // Strictly before: on the birthday itself the holder is not yet over N
            let over = today
                .checked_sub_months(Months::new(years * 12))
                .is_some_and(|limit| dob < limit);
            (format!("over{years}"), yes_no(over).to_string())
        })
        .collect()
}

fn name_attributes(holder: &Holder) -> Result<CredentialAttributes, InfoError> {
    if holder.family_name.trim().is_empty() {
        return Err(InfoError::MissingName("family name"));
    }
    let (prefix, family_name) = split_family_name(&holder.family_name);
    if family_name.is_empty() {
        return Err(InfoError::MissingName("family name"));
    }

    let firstnames = to_title_case(&holder.given_names.join(" "));
    // Best effort: the first given name is usually, but not always, the one in use
    let firstname = holder
        .given_names
        .first()
        .map(|name| to_title_case(name))
        .unwrap_or_default();

    Ok(CredentialAttributes::from([
        ("familyname".to_string(), to_title_case(&family_name)),
        ("prefix".to_string(), prefix),
        ("firstnames".to_string(), firstnames),
        ("firstname".to_string(), firstname),
    ]))
}

fn document_attributes(holder: &Holder) -> CredentialAttributes {
    CredentialAttributes::from([
        ("number".to_string(), holder.number.clone()),
        (
            "expires".to_string(),
            holder.date_of_expiry.format("%b %-d, %Y").to_string(),
        ),
        ("nationality".to_string(), holder.nationality.clone()),
        ("type".to_string(), holder.kind.as_attribute().to_string()),
    ])
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Parses a `ddMMyyyy` date.
fn parse_long_date(field: &'static str, value: &str) -> Result<NaiveDate, InfoError> {
    let value = value.trim();
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_date(field, value));
    }
    NaiveDate::parse_from_str(value, "%d%m%Y").map_err(|_| invalid_date(field, value))
}

/// Parses a `yyMMdd` date, placing the year in the window around `today`.
fn parse_short_date(
    field: &'static str,
    value: &str,
    today: NaiveDate,
) -> Result<NaiveDate, InfoError> {
    let value = value.trim();
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_date(field, value));
    }
    let number = |range: std::ops::Range<usize>| -> Result<u32, InfoError> {
        value[range]
            .parse::<u32>()
            .map_err(|_| invalid_date(field, value))
    };
    let (yy, month, day) = (number(0..2)?, number(2..4)?, number(4..6)?);

    let lower = today
        .checked_sub_months(Months::new(YEARS_BEHIND * 12))
        .ok_or_else(|| invalid_date(field, value))?;
    let upper = today
        .checked_add_months(Months::new(YEARS_AHEAD * 12))
        .ok_or_else(|| invalid_date(field, value))?;

    let century = today.year() - today.year().rem_euclid(100);
    // Only two centuries can fall into a 100 year window
    [century - 100, century, century + 100]
        .into_iter()
        .filter_map(|base| NaiveDate::from_ymd_opt(base + yy as i32, month, day))
        .find(|date| *date >= lower && *date < upper)
        .ok_or_else(|| invalid_date(field, value))
}

fn invalid_date(field: &'static str, value: &str) -> InfoError {
    InfoError::InvalidDate {
        field,
        value: value.to_string(),
    }
}
