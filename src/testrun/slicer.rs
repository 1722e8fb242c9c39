//! Cut a test file down to its preamble plus the one `test_that(` block under
//! the cursor.

/// Text that opens a test block.
pub const TEST_MARKER: &str = "test_that(";

/// Byte offsets of every test marker, followed by a sentinel equal to the
/// text length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIndex {
    offsets: Vec<usize>,
}

impl TestIndex {
    /// `None` when the text has no test markers.
    pub fn build(text: &str) -> Option<Self> {
        let mut offsets: Vec<usize> = text.match_indices(TEST_MARKER).map(|(i, _)| i).collect();
        if offsets.is_empty() {
            return None;
        }
        offsets.push(text.len());
        Some(Self { offsets })
    }

    /// Where the preamble ends.
    pub fn first(&self) -> usize {
        self.offsets[0]
    }

    /// `[start, end)` of the block for `cursor`: the last offset at or before
    /// it (the first marker if the cursor precedes all of them), up to the
    /// next offset. A cursor at or past the end lands on the sentinel and
    /// gets an empty block.
    pub fn block_for(&self, cursor: usize) -> (usize, usize) {
        let last = self.offsets.len() - 1;
        let i = self.offsets.iter().rposition(|&o| o <= cursor).unwrap_or(0);
        (self.offsets[i], self.offsets[(i + 1).min(last)])
    }
}

/// Preamble, a newline, then the block containing the cursor.
///
/// Only the last cursor picks the block; earlier cursors are ignored. Returns
/// `None` when the text has no tests or there are no cursors.
pub fn slice_test_block(text: &str, cursors: &[usize]) -> Option<String> {
    let index = TestIndex::build(text)?;
    let &cursor = cursors.last()?;
    let (start, end) = index.block_for(cursor);

    let preamble = &text[..index.first()];
    let mut out = String::with_capacity(preamble.len() + 1 + end - start);
    out.push_str(preamble);
    out.push('\n');
    out.push_str(&text[start..end]);
    Some(out)
}
