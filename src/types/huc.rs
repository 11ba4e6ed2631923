use std::fmt;
use std::sync::Arc;

/// Nesting level of a hydrologic container, coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HucLevel {
    Huc8,      // Subbasin
    Huc10,     // Watershed -> Huc8
    Huc12,     // Subwatershed -> Huc10
    Catchment, // Smallest drainage unit -> Huc12 (by centroid containment)
}

impl HucLevel {
    /// Name of the tag column stamped onto features assigned at this level.
    pub fn tag(&self) -> &'static str {
        match self {
            HucLevel::Huc8 => "huc8",
            HucLevel::Huc10 => "huc10",
            HucLevel::Huc12 => "huc12",
            HucLevel::Catchment => "catchment",
        }
    }

    /// Digit count of codes at this level. Catchment grid codes are opaque.
    pub fn code_len(&self) -> Option<usize> {
        match self {
            HucLevel::Huc8 => Some(8),
            HucLevel::Huc10 => Some(10),
            HucLevel::Huc12 => Some(12),
            HucLevel::Catchment => None,
        }
    }

    /// The next-coarser level, or `None` at the top of the hierarchy.
    pub fn parent(&self) -> Option<HucLevel> {
        match self {
            HucLevel::Huc8 => None,
            HucLevel::Huc10 => Some(HucLevel::Huc8),
            HucLevel::Huc12 => Some(HucLevel::Huc10),
            HucLevel::Catchment => Some(HucLevel::Huc12),
        }
    }

    /// All levels in processing order (coarse to fine).
    pub fn order() -> [HucLevel; 4] {
        [
            HucLevel::Huc8,
            HucLevel::Huc10,
            HucLevel::Huc12,
            HucLevel::Catchment,
        ]
    }
}

/// Stable key for a hydrologic unit.
/// Keeps the original code text (with leading zeros) but avoids repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HucCode {
    pub level: HucLevel,
    pub code: Arc<str>, // e.g., "07090002" for a HUC8, "0709000206" for a HUC10
}

impl HucCode {
    pub fn new(level: HucLevel, code: &str) -> Self {
        Self { level, code: Arc::from(code) }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Returns the `HucCode` of the enclosing unit at `parent_level` by
    /// truncating this code to the parent's prefix length. HUC codes are
    /// prefix-nested, so "0709000206" (HUC10) lies inside "07090002" (HUC8).
    ///
    /// Returns `None` for catchment codes (opaque grid codes, not prefixes)
    /// and when `parent_level` is not actually coarser than this level.
    pub fn to_parent(&self, parent_level: HucLevel) -> Option<HucCode> {
        let own_len = self.level.code_len()?;
        let parent_len = parent_level.code_len()?;
        if parent_len >= own_len {
            return None;
        }

        // Codes shorter than expected are passed through untruncated.
        let prefix: Arc<str> = Arc::from(&self.code[..self.code.len().min(parent_len)]);
        Some(HucCode { level: parent_level, code: prefix })
    }
}

impl fmt::Display for HucCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level.tag(), self.code)
    }
}
