use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

use tether_serde::{ByteReader, ByteWriter, SerdeErr};

use super::value::Replicable;
use crate::world::{EntityReader, EntityWriter};

/// Rate limiting state of one replicated field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTiming {
    update_interval: Duration,
    remaining: Duration,
}

impl FieldTiming {
    pub fn new(update_interval: Duration) -> Self {
        Self {
            update_interval,
            remaining: Duration::ZERO,
        }
    }

    /// Counts down by `delta`. A field whose countdown was still running
    /// this tick is not due, even if the countdown just reached zero.
    pub fn is_due(&mut self, delta: Duration) -> bool {
        if self.remaining > Duration::ZERO {
            self.remaining = self.remaining.saturating_sub(delta);
            false
        } else {
            true
        }
    }

    /// Starts a new countdown after the field was sent
    pub fn restart(&mut self) {
        self.remaining = self.update_interval;
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn set_update_interval(&mut self, update_interval: Duration) {
        self.update_interval = update_interval;
    }
}

/// Type-erased view of a field inside a replicated object
pub trait ReplicatedField: Send {
    /// Compares the value with the last-sent snapshot. A change refreshes
    /// the snapshot.
    fn changed(&mut self) -> bool;

    /// Encoding of the most recent change
    fn write(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter);

    /// Encoding of the complete state, for clients that have seen nothing
    fn write_full(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        self.write(writer, entities);
    }

    fn read(&mut self, reader: &mut ByteReader, entities: &mut dyn EntityReader)
        -> Result<(), SerdeErr>;

    fn timing(&mut self) -> &mut FieldTiming;
}

/// A single replicated value
#[derive(Debug, Clone)]
pub struct Field<T: Replicable> {
    value: T,
    snapshot: Option<T>,
    timing: FieldTiming,
}

impl<T: Replicable> Field<T> {
    pub fn new(value: T) -> Self {
        Self::with_interval(value, Duration::ZERO)
    }

    /// A field that is sent at most once per `update_interval`
    pub fn with_interval(value: T, update_interval: Duration) -> Self {
        Self {
            value,
            snapshot: None,
            timing: FieldTiming::new(update_interval),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }
}

impl<T: Replicable + Default> Default for Field<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Replicable> Deref for Field<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: Replicable> DerefMut for Field<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T: Replicable> ReplicatedField for Field<T> {
    fn changed(&mut self) -> bool {
        if self.snapshot.as_ref() == Some(&self.value) {
            return false;
        }
        self.snapshot = Some(self.value.clone());
        true
    }

    fn write(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        self.value.write(writer, entities);
    }

    fn read(
        &mut self,
        reader: &mut ByteReader,
        entities: &mut dyn EntityReader,
    ) -> Result<(), SerdeErr> {
        self.value = T::read(reader, entities)?;
        Ok(())
    }

    fn timing(&mut self) -> &mut FieldTiming {
        &mut self.timing
    }
}

/// Append-only replicated buffer. Changes travel as `{start, count, items}`;
/// the full encoding always starts at 0.
#[derive(Debug, Clone)]
pub struct SequenceField<T: Replicable> {
    items: Vec<T>,
    sent_len: usize,
    delta_start: usize,
    timing: FieldTiming,
}

impl<T: Replicable> Default for SequenceField<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Replicable> SequenceField<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            sent_len: 0,
            delta_start: 0,
            timing: FieldTiming::default(),
        }
    }

    pub fn with_interval(update_interval: Duration) -> Self {
        Self {
            timing: FieldTiming::new(update_interval),
            ..Self::new()
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.extend(items);
    }

    /// Empties the buffer; the next change resends from the start
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn write_from(&self, start: usize, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        let tail = &self.items[start.min(self.items.len())..];
        writer.write(&(start as u32));
        writer.write(&(tail.len() as u32));
        for item in tail {
            item.write(writer, entities);
        }
    }
}

impl<T: Replicable> ReplicatedField for SequenceField<T> {
    fn changed(&mut self) -> bool {
        if self.items.len() == self.sent_len {
            return false;
        }
        self.delta_start = if self.items.len() < self.sent_len {
            0
        } else {
            self.sent_len
        };
        self.sent_len = self.items.len();
        true
    }

    fn write(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        self.write_from(self.delta_start, writer, entities);
    }

    fn write_full(&self, writer: &mut ByteWriter, entities: &dyn EntityWriter) {
        self.write_from(0, writer, entities);
    }

    fn read(
        &mut self,
        reader: &mut ByteReader,
        entities: &mut dyn EntityReader,
    ) -> Result<(), SerdeErr> {
        let start: u32 = reader.try_read()?;
        let count: u32 = reader.try_read()?;
        self.items.truncate(start as usize);
        for _ in 0..count {
            self.items.push(T::read(reader, entities)?);
        }
        self.sent_len = self.items.len();
        Ok(())
    }

    fn timing(&mut self) -> &mut FieldTiming {
        &mut self.timing
    }
}
