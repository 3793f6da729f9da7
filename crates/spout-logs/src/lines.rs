//! Line splitting for raw runtime output.

/// Longest run of bytes held while waiting for a newline.
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// Buffers raw output chunks and yields complete lines.
///
/// Runtime streams deliver arbitrary chunks; a line may span several chunks
/// and a chunk may carry several lines. Partial trailing data is kept until
/// its newline arrives or [`LineSplitter::finish`] is called. A partial line
/// that grows past the limit is emitted as a piece of its own, so output
/// that never writes a newline is still forwarded in bounded memory.
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_line: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }
}

impl LineSplitter {
    /// Creates an empty splitter with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty splitter holding at most `max_line` bytes of a
    /// partial line. Values below 4 are raised to 4 so a UTF-8 character
    /// always fits.
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line: max_line.max(4),
        }
    }

    /// Appends a chunk and returns every line it completed, plus any
    /// over-long pieces cut at the limit.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let line = &rest[..pos];
            if self.pending.is_empty() {
                lines.push(Self::decode(line));
            } else {
                self.pending.extend_from_slice(line);
                lines.push(Self::decode(&self.pending));
                self.pending.clear();
            }
            rest = &rest[pos + 1..];
        }

        // pending never exceeds max_line between calls
        while self.pending.len() + rest.len() > self.max_line {
            let take = self.max_line - self.pending.len();
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            let cut = split_point(&self.pending);
            lines.push(String::from_utf8_lossy(&self.pending[..cut]).into_owned());
            self.pending.drain(..cut);
        }
        self.pending.extend_from_slice(rest);
        lines
    }

    /// Returns buffered data that never saw a newline, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(Self::decode(&rest))
    }

    fn decode(line: &[u8]) -> String {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    }
}

/// Where to cut a full buffer so a trailing multibyte character is not split.
fn split_point(buf: &[u8]) -> usize {
    let len = buf.len();
    for back in 1..=len.min(3) {
        let byte = buf[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back && back < len { len - back } else { len };
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"one\ntwo\n"), vec!["one", "two"]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn joins_line_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"hel").is_empty());
        assert_eq!(splitter.push(b"lo\nwor"), vec!["hello"]);
        assert_eq!(splitter.finish(), Some("wor".to_string()));
    }

    #[test]
    fn strips_carriage_return() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"dos\r\n"), vec!["dos"]);
    }

    #[test]
    fn keeps_empty_lines() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"\n\n"), vec!["", ""]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"bad \xff byte\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad "));
    }

    #[test]
    fn exact_limit_waits_for_newline() {
        let mut splitter = LineSplitter::with_max_line(4);
        assert!(splitter.push(b"abcd").is_empty());
        assert_eq!(splitter.push(b"\n"), vec!["abcd"]);
    }

    #[test]
    fn long_partial_line_is_cut_at_limit() {
        let mut splitter = LineSplitter::with_max_line(8);
        assert_eq!(splitter.push(b"abcdefghij"), vec!["abcdefgh"]);
        assert_eq!(splitter.push(b"kl\nm"), vec!["ijkl"]);
        assert_eq!(splitter.finish(), Some("m".to_string()));
    }

    #[test]
    fn cut_keeps_multibyte_character_whole() {
        let mut splitter = LineSplitter::with_max_line(4);
        assert_eq!(splitter.push("ab\u{20ac}".as_bytes()), vec!["ab"]);
        assert_eq!(splitter.finish(), Some("\u{20ac}".to_string()));
    }

    #[test]
    fn newline_free_stream_stays_bounded() {
        let mut splitter = LineSplitter::new();
        let chunk = vec![b'x'; DEFAULT_MAX_LINE];
        let mut forwarded = 0;
        for _ in 0..256 {
            for piece in splitter.push(&chunk) {
                assert!(piece.len() <= DEFAULT_MAX_LINE);
                forwarded += piece.len();
            }
            assert!(splitter.pending.len() <= DEFAULT_MAX_LINE);
        }
        forwarded += splitter.finish().map_or(0, |rest| rest.len());
        assert_eq!(forwarded, 256 * DEFAULT_MAX_LINE);
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_lines(
            text in "[a-z \n]{0,200}",
            cut in 0usize..200,
        ) {
            let bytes = text.as_bytes();
            let cut = cut.min(bytes.len());

            let mut whole = LineSplitter::new();
            let mut expected = whole.push(bytes);
            expected.extend(whole.finish());

            let mut split = LineSplitter::new();
            let mut actual = split.push(&bytes[..cut]);
            actual.extend(split.push(&bytes[cut..]));
            actual.extend(split.finish());

            prop_assert_eq!(actual, expected);
        }
    }
}
