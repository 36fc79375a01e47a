//! Name normalisation for Dutch style family names.

/// Family name prefixes ("tussenvoegsels"), matched longest first.
const PREFIXES: &[&str] = &[
    "af", "aan", "bij", "de", "den", "der", "d'", "het", "'t", "in", "onder", "op", "over", "'s",
    "te", "ten", "ter", "tot", "uit", "uijt", "van", "vanden", "ver", "voor", "aan de", "aan den",
    "aan der", "aan het", "aan 't", "bij de", "bij den", "bij het", "bij 't", "boven d'", "de die",
    "de die le", "de l'", "de la", "de las", "de le", "de van der", "in de", "in den", "in der",
    "in het", "in 't", "onder de", "onder den", "onder het", "onder 't", "over de", "over den",
    "over het", "over 't", "op de", "op den", "op der", "op gen", "op het", "op 't", "op ten",
    "van de", "van de l'", "van den", "van der", "van gen", "van het", "van la", "van 't",
    "van ter", "van van de", "uit de", "uit den", "uit het", "uit 't", "uit te de", "uit ten",
    "uijt de", "uijt den", "uijt het", "uijt 't", "uijt te de", "uijt ten", "voor de", "voor den",
    "voor in 't",
];

const WORD_DELIMITERS: &[char] = &[' ', '\'', '-', '/'];

/// Splits a family name into its lowercase prefix and the lowercase remainder.
///
/// A prefix only matches when followed by a space, so `"vanderberg"` has no prefix.
pub fn split_family_name(name: &str) -> (String, String) {
    let lower = name.trim().to_lowercase();

    let mut prefixes: Vec<&str> = PREFIXES.to_vec();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

    for prefix in prefixes {
        if let Some(rest) = lower
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(' '))
        {
            return (prefix.to_string(), rest.trim_start().to_string());
        }
    }
    (String::new(), lower)
}

/// Uppercases the first letter of every word and lowercases the rest.
///
/// Words are delimited by spaces, apostrophes, hyphens and slashes.
pub fn to_title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut capitalize = true;
    for c in input.chars() {
        if WORD_DELIMITERS.contains(&c) {
            out.push(c);
            capitalize = true;
        } else if capitalize {
            out.extend(c.to_uppercase());
            capitalize = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
