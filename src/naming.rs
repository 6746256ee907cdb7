//! Storage path naming for uploaded variant pairs.
//!
//! Both variants of one logical image share a single random identifier and
//! differ only by suffix:
//!
//! ```text
//! {base}/{uuid}_original.jpg
//! {base}/{uuid}_cropped.jpg
//! ```
//!
//! A fresh identifier per upload means a replacement pair never overwrites
//! the pair it replaces; the old objects stay intact until they are deleted
//! explicitly.

use std::fmt;
use uuid::Uuid;

/// Which derivative of an image a stored object holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Original,
    Cropped,
}

impl VariantKind {
    pub fn suffix(self) -> &'static str {
        match self {
            VariantKind::Original => "original",
            VariantKind::Cropped => "cropped",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Storage path of one variant.
///
/// Trailing slashes on `base` are ignored; an empty base puts the object at
/// the store root.
pub fn variant_path(base: &str, id: Uuid, kind: VariantKind) -> String {
    let base = base.trim_end_matches('/');
    let file = format!("{}_{}.jpg", id.hyphenated(), kind.suffix());
    if base.is_empty() {
        file
    } else {
        format!("{base}/{file}")
    }
}

/// Both storage paths of a pair, original first.
pub fn pair_paths(base: &str, id: Uuid) -> (String, String) {
    (
        variant_path(base, id, VariantKind::Original),
        variant_path(base, id, VariantKind::Cropped),
    )
}
