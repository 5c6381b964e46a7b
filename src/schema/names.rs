//! Type name normalization.

use std::path::Path;

/// Normalize a sheet or file name to a portal type name
///
/// Spaces are removed, the directory and extension are stripped, and
/// `snake_case` or `kebab-case` names become `CamelCase`.
///
/// # Examples
/// * `"cell_line.csv"` becomes `"CellLine"`
/// * `"/tmp/Cell Sample.tsv"` becomes `"CellSample"`
#[must_use]
pub fn type_name(name: &str) -> String {
    let compact: String = name.chars().filter(|c| *c != ' ').collect();
    let base = Path::new(&compact)
        .file_name()
        .map_or_else(|| compact.clone(), |base| base.to_string_lossy().to_string());
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base.as_str(),
    };
    to_camel_case(stem)
}

/// Convert a name to `CamelCase`
///
/// Names that already start with an upper case letter and have no `_` or `-`
/// are returned as they are.
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    let has_separator = name.contains(['_', '-']);
    if !has_separator && name.chars().next().is_some_and(char::is_uppercase) {
        return name.to_string();
    }
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(title_case)
        .collect()
}

/// Upper case the first letter and lower case the rest
#[must_use]
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Alternative spelling tried when a type name is not found
///
/// All upper or all lower case names are retried in title case.
#[must_use]
pub fn fallback_type_name(name: &str) -> Option<String> {
    let letters = name.chars().filter(|c| c.is_alphabetic());
    let all_upper = letters.clone().all(char::is_uppercase);
    let all_lower = letters.clone().all(char::is_lowercase);
    if name.is_empty() || !(all_upper || all_lower) {
        return None;
    }
    let candidate = title_case(name);
    (candidate != name).then_some(candidate)
}
