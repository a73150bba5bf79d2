//! Current chronological age
//!
//! Age criteria are not evaluated against a resource element but against the CQL age functions
//! of the patient in context.

use phf::phf_map;
use sq2cql_model::{Error, Result, TermCode};

pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";

/// SNOMED CT "Current chronological age"
pub const AGE_CODE: &str = "424144002";

/// UCUM unit to CQL age function
static AGE_FUNCTIONS: phf::Map<&'static str, &'static str> = phf_map! {
    "a" => "AgeInYears",
    "mo" => "AgeInMonths",
    "wk" => "AgeInWeeks",
    "d" => "AgeInDays",
    "h" => "AgeInHours",
};

pub fn is_age(term_code: &TermCode) -> bool {
    term_code.system == SNOMED_SYSTEM && term_code.code == AGE_CODE
}

pub fn age_function(unit: Option<&str>) -> Result<&'static str> {
    let unit = unit.ok_or_else(|| Error::MalformedInput("age value without unit".into()))?;
    AGE_FUNCTIONS
        .get(unit)
        .copied()
        .ok_or_else(|| Error::MalformedInput(format!("unknown age unit '{unit}'")))
}
