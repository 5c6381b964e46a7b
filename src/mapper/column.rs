//! Column name parsing.
//!
//! `a.b` addresses a nested object property, `tags#` an array filled from a
//! delimited cell, and `items#0.name` a property of the first array element.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{IngestError, Result};
use crate::schema::{ARRAY_NAME_SUFFIX, DOTTED_NAME_DELIMITER};

/// Largest array index a column name may address
pub const MAX_ARRAY_INDEX: usize = 1000;

/// One step of a column path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object property
    Key(String),
    /// Fixed array element
    Index(usize),
    /// Array filled from the delimited values of the cell; always last
    Append,
}

/// Parsed column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath {
    segments: SmallVec<[PathSegment; 4]>,
}

impl ColumnPath {
    /// Parse a column name
    ///
    /// A bare `#` in the middle of a path means element 0; a trailing bare
    /// `#` splits the cell into array elements. Indexes above
    /// [`MAX_ARRAY_INDEX`] are rejected.
    pub fn parse(column: &str) -> std::result::Result<Self, String> {
        let mut segments: SmallVec<[PathSegment; 4]> = SmallVec::new();
        let parts: Vec<&str> = column.split(DOTTED_NAME_DELIMITER).collect();
        for (part_index, part) in parts.iter().enumerate() {
            let mut pieces = part.split(ARRAY_NAME_SUFFIX);
            let name = pieces.next().unwrap_or_default().trim();
            if name.is_empty() {
                return Err(format!("empty property name in column '{column}'"));
            }
            segments.push(PathSegment::Key(name.to_string()));

            let markers: Vec<&str> = pieces.collect();
            for (marker_index, marker) in markers.iter().enumerate() {
                let is_last = part_index == parts.len() - 1 && marker_index == markers.len() - 1;
                if marker.is_empty() {
                    segments.push(if is_last { PathSegment::Append } else { PathSegment::Index(0) });
                } else {
                    let index = marker
                        .parse::<usize>()
                        .map_err(|_| format!("invalid array index '{marker}' in column '{column}'"))?;
                    if index > MAX_ARRAY_INDEX {
                        return Err(format!(
                            "array index {index} in column '{column}' exceeds the limit of {MAX_ARRAY_INDEX}"
                        ));
                    }
                    segments.push(PathSegment::Index(index));
                }
            }
        }
        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Top-level property the column writes to
    #[must_use]
    pub fn property(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Key(name)) => name,
            _ => "",
        }
    }

    /// Whether the cell is split into array elements
    #[must_use]
    pub fn is_append(&self) -> bool {
        matches!(self.segments.last(), Some(PathSegment::Append))
    }

    /// The path without a trailing append marker
    #[must_use]
    pub fn without_append(&self) -> Self {
        let mut segments = self.segments.clone();
        if matches!(segments.last(), Some(PathSegment::Append)) {
            segments.pop();
        }
        Self { segments }
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(name) if index == 0 => write!(f, "{name}")?,
                PathSegment::Key(name) => write!(f, "{DOTTED_NAME_DELIMITER}{name}")?,
                PathSegment::Index(i) => write!(f, "{ARRAY_NAME_SUFFIX}{i}")?,
                PathSegment::Append => write!(f, "{ARRAY_NAME_SUFFIX}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Array,
    Scalar,
}

impl Shape {
    fn describe(self) -> &'static str {
        match self {
            Self::Object => "an object",
            Self::Array => "an array",
            Self::Scalar => "a single value",
        }
    }
}

/// Check that no column prefix is used both as an array and as something else
///
/// `a#0.b` together with `a.c` is rejected, as is `a` together with `a.b`.
pub fn check_consistency(sheet: &str, paths: &[ColumnPath]) -> Result<()> {
    let mut shapes: FxHashMap<String, Shape> = FxHashMap::default();
    for path in paths {
        let segments = path.segments();
        let mut prefix = String::new();
        for (index, segment) in segments.iter().enumerate() {
            match segment {
                PathSegment::Key(name) => {
                    if !prefix.is_empty() {
                        prefix.push(DOTTED_NAME_DELIMITER);
                    }
                    prefix.push_str(name);
                }
                PathSegment::Index(_) | PathSegment::Append => prefix.push(ARRAY_NAME_SUFFIX),
            }
            let shape = match segments.get(index + 1) {
                None => Shape::Scalar,
                Some(PathSegment::Key(_)) => Shape::Object,
                Some(_) => Shape::Array,
            };
            match shapes.get(&prefix) {
                Some(existing) if *existing != shape => {
                    return Err(IngestError::parse(
                        sheet,
                        None,
                        format!(
                            "column '{path}' uses '{prefix}' as {} but another column uses it as {}",
                            shape.describe(),
                            existing.describe()
                        ),
                    ));
                }
                Some(_) => {}
                None => {
                    shapes.insert(prefix.clone(), shape);
                }
            }
        }
    }
    Ok(())
}
