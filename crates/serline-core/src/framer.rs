/// Accumulates received bytes and cuts them into `\n`-terminated lines.
///
/// The terminator stays part of the line. Whatever follows the last
/// terminator is kept until more bytes arrive or the framer is cleared.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            lines.push(self.buffer.drain(..=pos).collect());
        }
        lines
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
