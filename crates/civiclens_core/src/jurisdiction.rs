use crate::error::{CoreError, CoreResult};

const STATES: [(&str, &str); 50] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// A US state resolved from a mailing address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jurisdiction {
    pub abbreviation: &'static str,
    pub name: &'static str,
}

impl Jurisdiction {
    pub fn from_abbreviation(abbr: &str) -> Option<Self> {
        STATES
            .iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(abbr))
            .map(|&(abbreviation, name)| Self { abbreviation, name })
    }

    /// `"New York"` -> `"new_york"`, used in election ids.
    pub fn slug(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Resolve the state an address belongs to.
///
/// Pass 1 looks for a two-letter abbreviation as a whole word (so "CANAL" never
/// yields California); the last such word wins since US addresses end with the
/// state. Pass 2, only when pass 1 finds nothing, looks for a full state name
/// anywhere in the text, preferring the longest match ("West Virginia" over
/// "Virginia", "Arkansas" over "Kansas").
pub fn resolve_state(address: &str) -> CoreResult<Jurisdiction> {
    if let Some(found) = address
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| word.len() == 2)
        .filter_map(Jurisdiction::from_abbreviation)
        .last()
    {
        return Ok(found);
    }

    let lowered = address.to_lowercase();
    STATES
        .iter()
        .filter(|(_, name)| lowered.contains(&name.to_lowercase()))
        .max_by_key(|(_, name)| name.len())
        .map(|&(abbreviation, name)| Jurisdiction { abbreviation, name })
        .ok_or_else(|| CoreError::UnresolvableJurisdiction {
            address: address.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviation_whole_word() {
        let state = resolve_state("123 Main St, Sacramento, CA 95814").unwrap();
        assert_eq!(state.name, "California");
        assert_eq!(state.abbreviation, "CA");

        let state = resolve_state("9 elm street, austin, tx").unwrap();
        assert_eq!(state.name, "Texas");
    }

    #[test]
    fn test_abbreviation_inside_word_does_not_match() {
        // "CANAL" contains "CA", "CAL" contains "CA"; neither is a whole word.
        let err = resolve_state("12 CANAL STREET").unwrap_err();
        assert!(matches!(err, CoreError::UnresolvableJurisdiction { .. }));

        let err = resolve_state("CA90210").unwrap_err();
        assert!(matches!(err, CoreError::UnresolvableJurisdiction { .. }));
    }

    #[test]
    fn test_full_name_fallback() {
        let state = resolve_state("500 Capitol Ave, Frankfort, kentucky").unwrap();
        assert_eq!(state.name, "Kentucky");
    }

    #[test]
    fn test_full_name_prefers_longest_match() {
        assert_eq!(
            resolve_state("Charleston, West Virginia").unwrap().name,
            "West Virginia"
        );
        assert_eq!(resolve_state("Little Rock, Arkansas").unwrap().name, "Arkansas");
    }

    #[test]
    fn test_later_abbreviation_wins() {
        // "in" is a word earlier in the address; the trailing state code decides.
        let state = resolve_state("Unit 4 in the Annex, Portland, OR 97201").unwrap();
        assert_eq!(state.name, "Oregon");
    }

    #[test]
    fn test_unresolvable() {
        let err = resolve_state("10 Downing Street, London").unwrap_err();
        assert!(err.to_string().contains("Could not determine state"));
        assert!(resolve_state("").is_err());
    }

    #[test]
    fn test_every_state_resolves_by_abbreviation_and_name() {
        for (abbr, name) in STATES {
            let by_abbr = resolve_state(&format!("1 Main St, City, {abbr} 00000")).unwrap();
            assert_eq!(by_abbr.abbreviation, abbr, "abbreviation {abbr}");
            assert_eq!(by_abbr.name, name);

            let by_name = resolve_state(&format!("City, {name}")).unwrap();
            assert_eq!(by_name.abbreviation, abbr, "name {name}");
        }
    }

    #[test]
    fn test_slug() {
        let state = Jurisdiction::from_abbreviation("ny").unwrap();
        assert_eq!(state.slug(), "new_york");
        assert_eq!(state.to_string(), "New York");
    }
}
