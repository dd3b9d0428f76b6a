use crate::{error::SerdeErr, serde::Serde};

/// Read cursor over a received buffer.
///
/// `try_read` is strict and reports under-runs. `read` is permissive: on
/// under-run it yields the type's default (zero, empty) and leaves the cursor
/// where it was.
#[derive(Debug, Clone)]
pub struct ByteReader<'b> {
    buffer: &'b [u8],
    position: usize,
}

impl<'b> ByteReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn try_read<T: Serde>(&mut self) -> Result<T, SerdeErr> {
        let start = self.position;
        let result = T::de(self);
        if result.is_err() {
            self.position = start;
        }
        result
    }

    pub fn read<T: Serde + Default>(&mut self) -> T {
        self.try_read().unwrap_or_default()
    }

    /// Take exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<&'b [u8], SerdeErr> {
        let available = self.available();
        if count > available {
            return Err(SerdeErr::UnderRun {
                needed: count,
                available,
            });
        }
        let bytes = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerdeErr> {
        let mut output = [0_u8; N];
        output.copy_from_slice(self.read_bytes(N)?);
        Ok(output)
    }

    /// Everything not yet consumed
    pub fn remaining(&self) -> &'b [u8] {
        &self.buffer[self.position..]
    }

    /// Consume and return everything not yet read
    pub fn take_remaining(&mut self) -> &'b [u8] {
        let rest = self.remaining();
        self.position = self.buffer.len();
        rest
    }

    pub fn available(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
