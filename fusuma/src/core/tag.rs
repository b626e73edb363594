/// Highest number of tags a monitor can address.
pub const MAX_TAGS: u32 = 31;

/// A bitmask over up to 31 tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tag(u32);

impl Tag {
    pub fn new(n: u32) -> Self {
        assert!(n > 0 && n <= MAX_TAGS);
        Self(1 << (n - 1))
    }

    pub fn from_mask(mask: u32) -> Self {
        Self(mask & Self::all(MAX_TAGS).0)
    }

    /// Mask selecting the first `count` tags.
    pub fn all(count: u32) -> Self {
        let count = count.min(MAX_TAGS);
        Self(((1u64 << count) - 1) as u32)
    }

    pub fn mask(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: Tag) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn intersection(self, other: Tag) -> Self {
        Self(self.0 & other.0)
    }

    pub fn union(self, other: Tag) -> Self {
        Self(self.0 | other.0)
    }

    pub fn toggle(self, other: Tag) -> Self {
        Self(self.0 ^ other.0)
    }

    /// Returns the tag number (1-31) of the lowest set bit, or None if empty
    pub fn first_tag(self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        Some(self.0.trailing_zeros() + 1)
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}
