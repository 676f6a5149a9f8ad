//! crates/bookshelf_core/src/isbn.rs
//!
//! ISBN normalization and the deduplicated ISBN lists stored on books.

/// Strips everything but digits and `X`, uppercasing `x`.
///
/// `"978-0-13-468599-1"` and `"9780134685991"` normalize to the same value.
pub fn normalize_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == 'X' || *ch == 'x')
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Normalizes every value, drops the ones left empty and removes duplicates
/// while keeping first-seen order.
pub fn normalize_isbn_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let isbn = normalize_isbn(value.as_ref());
        if !isbn.is_empty() && !out.contains(&isbn) {
            out.push(isbn);
        }
    }
    out
}

/// True when the two lists have at least one ISBN in common.
pub fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().any(|isbn| b.contains(isbn))
}
