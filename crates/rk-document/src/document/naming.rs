//! Object and document names
//!
//! Names are identifiers: ASCII letters, digits and `_`, not starting with a
//! digit. A taken name gets the next numeric suffix (`Box`, `Box1`, `Box2`).

use std::collections::HashSet;

/// Turn arbitrary text into an identifier
pub fn clean_name(name: &str) -> String {
    let mut clean = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => clean.push(c),
            'ä' => clean.push_str("ae"),
            'ö' => clean.push_str("oe"),
            'ü' => clean.push_str("ue"),
            'Ä' => clean.push_str("Ae"),
            'Ö' => clean.push_str("Oe"),
            'Ü' => clean.push_str("Ue"),
            'ß' => clean.push_str("ss"),
            _ => clean.push('_'),
        }
    }

    if clean.is_empty() {
        return "Unnamed".to_string();
    }
    if clean.starts_with(|c: char| c.is_ascii_digit()) {
        clean.replace_range(..1, "_");
    }
    clean
}

/// `base` if it is free, otherwise `base` with the highest numeric suffix
/// among the taken names plus one. When that suffix would overflow, the
/// lowest free suffix is used instead.
pub fn unique_name<'a>(base: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }

    let highest = taken
        .iter()
        .filter_map(|name| name.strip_prefix(base))
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    if let Some(next) = highest.checked_add(1) {
        let candidate = format!("{}{}", base, next);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
    }
    (1..=u64::MAX)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| format!("{}_", base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("Box"), "Box");
        assert_eq!(clean_name("my part.step"), "my_part_step");
        assert_eq!(clean_name("3D Print"), "_D_Print");
        assert_eq!(clean_name("Größe"), "Groesse");
        assert_eq!(clean_name(""), "Unnamed");
    }

    #[test]
    fn test_unique_name_suffix() {
        assert_eq!(unique_name("Box", ["Fillet"]), "Box");
        assert_eq!(unique_name("Box", ["Box"]), "Box1");
        assert_eq!(unique_name("Box", ["Box", "Box1", "Box7", "Boxer"]), "Box8");
        assert_eq!(unique_name("Box", ["Box", "Box1a"]), "Box1");
    }

    #[test]
    fn test_unique_name_suffix_overflow() {
        let max = format!("Box{}", u64::MAX);
        assert_eq!(unique_name("Box", ["Box", max.as_str()]), "Box1");
        assert_eq!(unique_name("Box", ["Box", "Box1", max.as_str()]), "Box2");
        assert_eq!(
            unique_name("Box", ["Box", "Box99999999999999999999999"]),
            "Box1"
        );
    }
}
