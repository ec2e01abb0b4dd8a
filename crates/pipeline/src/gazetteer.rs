//! Curated place and crop names recognised in questions.
//!
//! Matching works on normalized tokens (lowercase, alphanumeric runs), so
//! "Tamil-Nadu", "tamil nadu" and "TAMIL NADU?" all match the same entry,
//! while "gram" never matches inside "program".

pub use samarth_sources::places::{district_state, DISTRICTS};

/// States and union territories.
pub const STATES: &[&str] = &[
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Puducherry",
];

/// Alternative spellings mapped to the canonical state name.
const STATE_ALIASES: &[(&str, &str)] = &[
    ("Orissa", "Odisha"),
    ("UP", "Uttar Pradesh"),
    ("MP", "Madhya Pradesh"),
    ("Pondicherry", "Puducherry"),
    ("Bengal", "West Bengal"),
];

/// Canonical crop name with the phrases that refer to it.
pub const CROPS: &[(&str, &[&str])] = &[
    ("Rice", &["rice", "paddy"]),
    ("Wheat", &["wheat"]),
    ("Cotton", &["cotton", "kapas"]),
    ("Sugarcane", &["sugarcane", "sugar cane"]),
    ("Maize", &["maize", "corn"]),
    ("Bajra", &["bajra", "pearl millet"]),
    ("Jowar", &["jowar", "sorghum"]),
    ("Ragi", &["ragi", "finger millet"]),
    ("Barley", &["barley"]),
    ("Pulses", &["pulses"]),
    ("Gram", &["gram", "chana", "chickpea", "chickpeas"]),
    ("Tur", &["tur", "arhar", "pigeon pea"]),
    ("Moong", &["moong", "green gram"]),
    ("Urad", &["urad", "black gram"]),
    ("Oilseeds", &["oilseeds", "oilseed"]),
    ("Groundnut", &["groundnut", "groundnuts", "peanut", "peanuts"]),
    ("Soybean", &["soybean", "soyabean", "soya"]),
    ("Mustard", &["mustard", "rapeseed"]),
    ("Potato", &["potato", "potatoes"]),
    ("Onion", &["onion", "onions"]),
    ("Tomato", &["tomato", "tomatoes"]),
    ("Brinjal", &["brinjal", "eggplant"]),
];

/// Lowercase alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether the tokens of `phrase` appear consecutively in `tokens`.
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    tokens.windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Every place named in `tokens`, as canonical state or district names.
///
/// Two-letter aliases ("UP", "MP") only match when written in capitals in
/// the original text, so "up" in "sum up" is not a state.
pub fn find_locations(text: &str, tokens: &[String]) -> Vec<String> {
    let mut found = Vec::new();

    for state in STATES {
        if contains_phrase(tokens, state) {
            found.push(state.to_string());
        }
    }

    for (alias, state) in STATE_ALIASES {
        let matched = if alias.len() <= 2 {
            text.split(|c: char| !c.is_alphanumeric()).any(|t| t == *alias)
        } else {
            contains_phrase(tokens, alias)
        };
        // "West Bengal" already covers "Bengal"
        if matched && !found.iter().any(|f| f == state) {
            found.push(state.to_string());
        }
    }

    for (district, _) in DISTRICTS {
        if contains_phrase(tokens, district) {
            found.push(district.to_string());
        }
    }

    found
}

/// Every crop named in `tokens`, as canonical crop names.
///
/// A multi-word synonym wins over its last word ("green gram" is Moong, not Gram).
pub fn find_crops(tokens: &[String]) -> Vec<String> {
    let mut consumed = vec![false; tokens.len()];
    let mut found: Vec<String> = Vec::new();

    let mut phrases: Vec<(&str, Vec<String>)> = CROPS
        .iter()
        .flat_map(|(crop, synonyms)| synonyms.iter().map(move |s| (*crop, tokenize(s))))
        .collect();
    // Longest phrases first
    phrases.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    for (crop, needle) in &phrases {
        let n = needle.len();
        if n == 0 || n > tokens.len() {
            continue;
        }
        for start in 0..=(tokens.len() - n) {
            let span = start..start + n;
            if consumed[span.clone()].iter().any(|c| *c) {
                continue;
            }
            if tokens[span.clone()] == needle[..] {
                consumed[span].iter_mut().for_each(|c| *c = true);
                if !found.iter().any(|f| f == crop) {
                    found.push(crop.to_string());
                }
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Rice, in Tamil-Nadu (2021)?"),
            vec!["rice", "in", "tamil", "nadu", "2021"]
        );
    }

    #[test]
    fn test_multi_word_states() {
        let text = "wheat in uttar pradesh and madhya pradesh";
        let found = find_locations(text, &tokenize(text));
        assert_eq!(found, vec!["Madhya Pradesh", "Uttar Pradesh"]);
    }

    #[test]
    fn test_state_aliases() {
        let text = "Paddy in Orissa and UP";
        let found = find_locations(text, &tokenize(text));
        assert_eq!(found, vec!["Odisha", "Uttar Pradesh"]);

        let text = "sum up rainfall";
        assert!(find_locations(text, &tokenize(text)).is_empty());
    }

    #[test]
    fn test_bengal_alias_does_not_duplicate() {
        let text = "rice in West Bengal";
        assert_eq!(find_locations(text, &tokenize(text)), vec!["West Bengal"]);
    }

    #[test]
    fn test_districts() {
        let text = "rainfall in Pune and Ludhiana";
        let found = find_locations(text, &tokenize(text));
        assert_eq!(found, vec!["Pune", "Ludhiana"]);
        assert_eq!(district_state("pune"), Some("Maharashtra"));
    }

    #[test]
    fn test_crop_synonyms() {
        assert_eq!(find_crops(&tokenize("paddy and corn")), vec!["Rice", "Maize"]);
        assert_eq!(find_crops(&tokenize("green gram prices")), vec!["Moong"]);
        assert!(find_crops(&tokenize("government program")).is_empty());
    }
}
