//! Year-level labels derived from section names.
//!
//! Sections are named `<year>-<block>` ("3-1" is the first block of third
//! year). Anything that does not start with a year between 1 and 5 lands in
//! [`OTHER_YEAR`].

/// Label for sections whose name does not encode a known year level.
pub const OTHER_YEAR: &str = "Other Year";

/// Map a section name to its year-level label.
pub fn year_level_label(section_name: &str) -> &'static str {
    let prefix = section_name.split('-').next().unwrap_or_default().trim();
    match prefix.parse::<u8>() {
        Ok(1) => "1st Year",
        Ok(2) => "2nd Year",
        Ok(3) => "3rd Year",
        Ok(4) => "4th Year",
        Ok(5) => "5th Year",
        _ => OTHER_YEAR,
    }
}
