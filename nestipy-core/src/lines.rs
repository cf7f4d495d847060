//! Line assembly for raw descriptor reads.
//!
//! A reader owns exactly one [`LineBuffer`]; bytes go in as they arrive and
//! completed lines come out. Invalid UTF-8 is replaced, never rejected.

/// Which bytes terminate a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSplit {
    /// `\n` only. `\r` stays part of the line.
    Newline,
    /// Either `\n` or `\r`. Progress bars that redraw with `\r` yield one line
    /// per redraw.
    NewlineOrCarriage,
}

impl LineSplit {
    fn is_terminator(self, byte: u8) -> bool {
        match self {
            LineSplit::Newline => byte == b'\n',
            LineSplit::NewlineOrCarriage => byte == b'\n' || byte == b'\r',
        }
    }
}

#[derive(Debug)]
pub struct LineBuffer {
    split: LineSplit,
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new(split: LineSplit) -> Self {
        Self {
            split,
            pending: Vec::with_capacity(4096),
        }
    }

    /// Append `bytes` and drain every completed line, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(idx) = self
            .pending
            .iter()
            .position(|byte| self.split.is_terminator(*byte))
        {
            let mut chunk: Vec<u8> = self.pending.drain(..=idx).collect();
            chunk.pop();
            lines.push(String::from_utf8_lossy(&chunk).into_owned());
        }
        lines
    }

    /// Take whatever is left after end-of-stream, if anything.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
