//! US state and territory code tables.
//!
//! Two-digit FIPS codes, two-letter postal abbreviations, and full names
//! for the 50 states, DC, and the inhabited territories. The converter
//! falls back to [`name_to_abbr`] when a record carries no abbreviation.

/// One row of the code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCode {
    /// Two-digit FIPS code.
    pub fips: &'static str,
    /// Two-letter postal abbreviation.
    pub abbr: &'static str,
    /// Full name as used by the Census Bureau.
    pub name: &'static str,
}

const fn code(fips: &'static str, abbr: &'static str, name: &'static str) -> StateCode {
    StateCode { fips, abbr, name }
}

/// All known states, DC, and territories, ordered by FIPS code.
pub const STATE_CODES: &[StateCode] = &[
    code("01", "AL", "Alabama"),
    code("02", "AK", "Alaska"),
    code("04", "AZ", "Arizona"),
    code("05", "AR", "Arkansas"),
    code("06", "CA", "California"),
    code("08", "CO", "Colorado"),
    code("09", "CT", "Connecticut"),
    code("10", "DE", "Delaware"),
    code("11", "DC", "District of Columbia"),
    code("12", "FL", "Florida"),
    code("13", "GA", "Georgia"),
    code("15", "HI", "Hawaii"),
    code("16", "ID", "Idaho"),
    code("17", "IL", "Illinois"),
    code("18", "IN", "Indiana"),
    code("19", "IA", "Iowa"),
    code("20", "KS", "Kansas"),
    code("21", "KY", "Kentucky"),
    code("22", "LA", "Louisiana"),
    code("23", "ME", "Maine"),
    code("24", "MD", "Maryland"),
    code("25", "MA", "Massachusetts"),
    code("26", "MI", "Michigan"),
    code("27", "MN", "Minnesota"),
    code("28", "MS", "Mississippi"),
    code("29", "MO", "Missouri"),
    code("30", "MT", "Montana"),
    code("31", "NE", "Nebraska"),
    code("32", "NV", "Nevada"),
    code("33", "NH", "New Hampshire"),
    code("34", "NJ", "New Jersey"),
    code("35", "NM", "New Mexico"),
    code("36", "NY", "New York"),
    code("37", "NC", "North Carolina"),
    code("38", "ND", "North Dakota"),
    code("39", "OH", "Ohio"),
    code("40", "OK", "Oklahoma"),
    code("41", "OR", "Oregon"),
    code("42", "PA", "Pennsylvania"),
    code("44", "RI", "Rhode Island"),
    code("45", "SC", "South Carolina"),
    code("46", "SD", "South Dakota"),
    code("47", "TN", "Tennessee"),
    code("48", "TX", "Texas"),
    code("49", "UT", "Utah"),
    code("50", "VT", "Vermont"),
    code("51", "VA", "Virginia"),
    code("53", "WA", "Washington"),
    code("54", "WV", "West Virginia"),
    code("55", "WI", "Wisconsin"),
    code("56", "WY", "Wyoming"),
    code("60", "AS", "American Samoa"),
    code("66", "GU", "Guam"),
    code("69", "MP", "Northern Mariana Islands"),
    code("72", "PR", "Puerto Rico"),
    code("78", "VI", "U.S. Virgin Islands"),
];

/// Looks up a row by full name (case-insensitive, surrounding whitespace
/// ignored).
#[must_use]
pub fn by_name(name: &str) -> Option<&'static StateCode> {
    let name = name.trim();
    STATE_CODES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Maps a full state name to its postal abbreviation.
#[must_use]
pub fn name_to_abbr(name: &str) -> Option<&'static str> {
    by_name(name).map(|c| c.abbr)
}
