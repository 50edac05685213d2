/// A source location: file ID + byte offset range.
///
/// IR nodes carry the span of the macro-assembly source they were built
/// from, so a failed translation can point back at the offending line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// Span for synthetic nodes (legalizer inserts, test fixtures).
    pub fn dummy() -> Self {
        Self {
            file_id: 0,
            start: 0,
            end: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_construction() {
        let s = Span::new(1, 10, 20);
        assert_eq!(s.file_id, 1);
        assert_eq!(s.start, 10);
        assert_eq!(s.end, 20);
    }

    #[test]
    fn test_dummy_span() {
        let s = Span::dummy();
        assert_eq!(s.start, 0);
        assert_eq!(s.end, 0);
    }
}
