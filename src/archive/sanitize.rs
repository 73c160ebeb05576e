//! Archive path sanitizing and collision handling
//!
//! Product names become directory names inside the archive. Only characters
//! that are safe on every filesystem survive, and [`NameAllocator`] makes
//! sure two products that sanitize to the same name still get distinct
//! directories.

use std::collections::HashSet;

/// Directory name used when nothing of the product name survives sanitizing
pub const FALLBACK_DIRECTORY: &str = "product";

/// Longest directory name in bytes, leaving room for a collision suffix
/// under the common 255-byte file name limit
pub const MAX_DIRECTORY_BYTES: usize = 200;

/// Strips a product name down to archive-safe characters
///
/// Kept: ASCII letters and digits, Cyrillic letters, `-` and `_`.
/// Every run of whitespace becomes a single `_`; everything else is dropped.
/// Characters are dropped before whitespace is collapsed, so `"a ? b"`
/// becomes `"a_b"`.
///
/// The result is a fixed point: `sanitize_name(&sanitize_name(x)) == sanitize_name(x)`.
///
/// # Examples
///
/// ```
/// use product_archiver::archive::sanitize_name;
///
/// assert_eq!(sanitize_name("Чайник  Bosch / TWK-1"), "Чайник_Bosch_TWK-1");
/// ```
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
                in_whitespace = true;
            }
        } else if is_kept(c) {
            sanitized.push(c);
            in_whitespace = false;
        }
    }

    sanitized
}

fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '-'
        || c == '_'
        || ('а'..='я').contains(&c)
        || ('А'..='Я').contains(&c)
        || c == 'ё'
        || c == 'Ё'
}

/// Sanitized directory name for a product, never empty
///
/// Names longer than [`MAX_DIRECTORY_BYTES`] are cut at a character
/// boundary.
pub fn product_directory(product_name: &str) -> String {
    let mut sanitized = sanitize_name(product_name);
    if sanitized.is_empty() {
        return FALLBACK_DIRECTORY.to_string();
    }

    if sanitized.len() > MAX_DIRECTORY_BYTES {
        let mut cut = MAX_DIRECTORY_BYTES;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
    }

    sanitized
}

/// Hands out names that are unique within one scope
///
/// The first request for a name gets it unchanged; later requests get a
/// numeric suffix inserted before the extension (`a.jpg`, `a-2.jpg`,
/// `a-3.jpg`).
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `candidate`, or the first free suffixed variant of it
    pub fn allocate(&mut self, candidate: &str) -> String {
        if self.taken.insert(candidate.to_string()) {
            return candidate.to_string();
        }

        let (stem, extension) = split_extension(candidate);
        let mut n = 2u32;
        loop {
            let name = format!("{}-{}{}", stem, n, extension);
            if self.taken.insert(name.clone()) {
                return name;
            }
            n += 1;
        }
    }
}

/// Splits `name` into stem and extension (dot included)
///
/// A leading dot is part of the stem, so `.hidden` has no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}
