//! Newline framing for serial payloads

/// Most bytes kept between polls, complete lines included
pub const MAX_PENDING: usize = 256;

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        if self.pending.len() > MAX_PENDING {
            // Oldest bytes go first, cut on a line boundary when that still
            // leaves something to read
            let excess = self.pending.len() - MAX_PENDING;
            let cut = self.pending[excess..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| excess + i + 1)
                .filter(|&cut| cut < self.pending.len())
                .unwrap_or(excess);
            self.pending.drain(..cut);
        }
    }

    /// Pop the oldest complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        let text = String::from_utf8_lossy(&line[..end]);
        Some(text.trim_end_matches('\r').to_string())
    }

    /// Pop every complete line and keep only the newest.
    ///
    /// A board printing faster than we poll would otherwise be read ever
    /// further behind.
    pub fn latest_line(&mut self) -> Option<String> {
        let mut latest = None;
        while let Some(line) = self.next_line() {
            latest = Some(line);
        }
        latest
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_line_per_call() {
        let mut buf = LineBuffer::new();
        buf.extend(b"1\r\n-1\n0");

        assert_eq!(buf.next_line().as_deref(), Some("1"));
        assert_eq!(buf.next_line().as_deref(), Some("-1"));
        assert_eq!(buf.next_line(), None);

        buf.extend(b"\n");
        assert_eq!(buf.next_line().as_deref(), Some("0"));
        assert!(buf.is_empty());
    }

    #[test]
    fn unterminated_noise_is_bounded() {
        let mut buf = LineBuffer::new();
        buf.extend(&[b'x'; MAX_PENDING * 3]);
        buf.extend(b"1\n");

        let line = buf.next_line().unwrap();
        assert!(line.len() <= MAX_PENDING + 1);
        assert!(line.ends_with('1'));
    }

    #[test]
    fn invalid_utf8_does_not_panic() {
        let mut buf = LineBuffer::new();
        buf.extend(&[0xff, 0xfe, b'\n']);
        assert!(buf.next_line().is_some());
    }

    #[test]
    fn chatty_device_stays_bounded_and_current() {
        let mut buf = LineBuffer::new();

        for poll in 0..10_000 {
            buf.extend(&b"1\r\n".repeat(16));
            if poll == 9_999 {
                buf.extend(b"-1\n");
            }
            assert!(buf.pending.len() <= MAX_PENDING);
            let line = buf.latest_line();
            if poll < 9_999 {
                assert_eq!(line.as_deref(), Some("1"));
            } else {
                assert_eq!(line.as_deref(), Some("-1"));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn cap_keeps_whole_lines_when_it_can() {
        let mut buf = LineBuffer::new();
        buf.extend(&b"-1\n".repeat(200));

        assert!(buf.pending.len() <= MAX_PENDING);
        assert_eq!(buf.next_line().as_deref(), Some("-1"));
    }
}
