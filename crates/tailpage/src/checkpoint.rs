/// Confirmed correspondence between a raw byte offset and a position in the
/// produced text.
///
/// Text positions count chars of the produced [`StyledRun`] sequence.
///
/// [`StyledRun`]: crate::StyledRun
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Checkpoint {
    pub byte_offset: usize,
    pub text_position: usize,
}

impl Checkpoint {
    pub const START: Self = Self {
        byte_offset: 0,
        text_position: 0,
    };

    #[must_use]
    pub const fn new(byte_offset: usize, text_position: usize) -> Self {
        Self {
            byte_offset,
            text_position,
        }
    }

    /// Whether `self` lies at or after `other` on both axes.
    #[must_use]
    pub fn dominates(&self, other: &Checkpoint) -> bool {
        self.byte_offset >= other.byte_offset && self.text_position >= other.text_position
    }
}
