//! Character-kind classification and anchor contexts.
//!
//! Anchors (`^`, `$`, `\A`, `\z`, `\Z`, `\b`, `\B`) are nullable or not
//! depending only on a coarse classification of the characters immediately
//! before and after the current position. A `CharKind` is that
//! classification; a `Context` packs the previous and next kind into a
//! single small key so nullability can be decided without re-deriving the
//! node.

/// Classification of a character relative to the anchors a pattern can use.
///
/// `NewLineS` marks a newline that coincides with the start or end of the
/// input (the "last `\n`" case, and symmetrically the first `\n` when
/// running a reversed automaton).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum CharKind {
    General = 0,
    StartStop = 1,
    Newline = 2,
    NewLineS = 3,
    WordLetter = 4,
}

impl CharKind {
    #[inline]
    fn from_bits(bits: u8) -> CharKind {
        match bits {
            0 => CharKind::General,
            1 => CharKind::StartStop,
            2 => CharKind::Newline,
            3 => CharKind::NewLineS,
            _ => CharKind::WordLetter,
        }
    }

    /// True for kinds that terminate or begin a line: start/stop of input,
    /// `\n`, and the final-`\n` sentinel kind.
    #[inline]
    pub fn is_line_boundary(self) -> bool {
        matches!(
            self,
            CharKind::StartStop | CharKind::Newline | CharKind::NewLineS
        )
    }

    /// True for kinds `\Z` accepts ahead: end of input or the final `\n`.
    #[inline]
    pub fn is_final_boundary(self) -> bool {
        matches!(self, CharKind::StartStop | CharKind::NewLineS)
    }

    #[inline]
    pub fn is_word(self) -> bool {
        self == CharKind::WordLetter
    }
}

/// A previous and next [`CharKind`] packed into one key: `(next << 3) | prev`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context(u8);

impl Context {
    #[inline]
    pub fn new(prev: CharKind, next: CharKind) -> Context {
        Context((next as u8) << 3 | prev as u8)
    }

    #[inline]
    pub fn prev(self) -> CharKind {
        CharKind::from_bits(self.0 & 0b111)
    }

    #[inline]
    pub fn next(self) -> CharKind {
        CharKind::from_bits(self.0 >> 3)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Context({:?}, {:?})", self.prev(), self.next())
    }
}
