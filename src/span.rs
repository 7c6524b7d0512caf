/// Position in the source text. 32 bits should be enough for everyone.
type Pos = u32;

/// Byte range in definition source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: Pos,
    end: Pos,
}

#[derive(Debug)]
pub struct Spanned<T> {
    value: T,
    span: Span,
}

impl<T> Spanned<T> {
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn split(self) -> (T, Span) {
        (self.value, self.span)
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> std::cmp::PartialEq for Spanned<T>
where
    T: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Clone for Spanned<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            span: self.span,
        }
    }
}

impl Span {
    pub fn with<T>(self, value: T) -> Spanned<T> {
        Spanned { value, span: self }
    }

    /// Text of the source covered by the span. Empty if the span lies outside the source.
    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }

    /// One-based line and column of the span start.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let before = source.get(..self.start as usize).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        (line, col)
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start as Pos,
            end: range.end as Pos,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice() {
        let source = "streams A() = {};";
        assert_eq!(Span::from(0..9).slice(source), "streams A");
        assert_eq!(Span::from(10..40).slice(source), "");
    }

    #[test]
    fn line_and_column() {
        let source = "first\nsecond line\nthird";
        let span = Span::from(13..17);
        assert_eq!(span.line_col(source), (2, 8));
        assert_eq!(Span::from(0..0).line_col(source), (1, 1));
    }
}
