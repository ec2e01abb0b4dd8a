//! Districts known to the portal resources, with the state each belongs to.
//!
//! The portal filters on state only, so a district in a request is widened
//! to its state on the wire and narrowed again when records are selected.

use crate::types::FilterParams;
use std::collections::BTreeSet;

/// Agricultural districts: (district, state).
pub const DISTRICTS: &[(&str, &str)] = &[
    ("Pune", "Maharashtra"),
    ("Nashik", "Maharashtra"),
    ("Nagpur", "Maharashtra"),
    ("Aurangabad", "Maharashtra"),
    ("Solapur", "Maharashtra"),
    ("Ludhiana", "Punjab"),
    ("Amritsar", "Punjab"),
    ("Patiala", "Punjab"),
    ("Bathinda", "Punjab"),
    ("Lucknow", "Uttar Pradesh"),
    ("Kanpur", "Uttar Pradesh"),
    ("Varanasi", "Uttar Pradesh"),
    ("Meerut", "Uttar Pradesh"),
    ("Gurgaon", "Haryana"),
    ("Karnal", "Haryana"),
    ("Hisar", "Haryana"),
    ("Patna", "Bihar"),
    ("Jaipur", "Rajasthan"),
    ("Jodhpur", "Rajasthan"),
    ("Ahmedabad", "Gujarat"),
    ("Rajkot", "Gujarat"),
    ("Indore", "Madhya Pradesh"),
    ("Bhopal", "Madhya Pradesh"),
    ("Bengaluru", "Karnataka"),
    ("Mysuru", "Karnataka"),
    ("Belagavi", "Karnataka"),
    ("Thanjavur", "Tamil Nadu"),
    ("Coimbatore", "Tamil Nadu"),
    ("Guntur", "Andhra Pradesh"),
    ("Krishna", "Andhra Pradesh"),
    ("Warangal", "Telangana"),
    ("Cuttack", "Odisha"),
    ("Bardhaman", "West Bengal"),
    ("Palakkad", "Kerala"),
];

/// State a district belongs to.
pub fn district_state(district: &str) -> Option<&'static str> {
    DISTRICTS
        .iter()
        .find(|(d, _)| d.eq_ignore_ascii_case(district))
        .map(|(_, state)| *state)
}

/// The one state every requested location falls in, if there is one.
/// Districts count as their state; unknown names are taken as states.
pub fn portal_state(filters: &FilterParams) -> Option<String> {
    let states: BTreeSet<&str> = filters
        .locations
        .iter()
        .map(|location| district_state(location).unwrap_or(location.as_str()))
        .collect();

    if states.len() == 1 {
        states.into_iter().next().map(str::to_string)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(locations: &[&str]) -> FilterParams {
        let mut filters = FilterParams::all_india();
        filters.locations.extend(locations.iter().map(|l| l.to_string()));
        filters
    }

    #[test]
    fn test_district_state() {
        assert_eq!(district_state("nashik"), Some("Maharashtra"));
        assert_eq!(district_state("Punjab"), None);
    }

    #[test]
    fn test_portal_state_widens_districts() {
        assert_eq!(portal_state(&filters(&["Nashik"])).as_deref(), Some("Maharashtra"));
        assert_eq!(
            portal_state(&filters(&["Pune", "Maharashtra"])).as_deref(),
            Some("Maharashtra")
        );
        assert_eq!(portal_state(&filters(&["Punjab"])).as_deref(), Some("Punjab"));
        assert_eq!(portal_state(&filters(&["Pune", "Ludhiana"])), None);
        assert_eq!(portal_state(&FilterParams::all_india()), None);
    }
}
