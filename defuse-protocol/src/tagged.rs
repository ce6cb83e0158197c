//! Tagged values: typed fields carried as `name:value` fragments.
//!
//! A module declares the values it needs from the controller as a set of
//! [`TaggedValue`]s and hands the set to
//! [`DefuseModule::wait_for_init`](crate::DefuseModule::wait_for_init).
//! Every incoming fragment is offered to the set until each value has been
//! seen at least once.

use crate::error::ParseError;

/// Buffer size for serial numbers, terminator included
pub const SERIAL_NUMBER_CAPACITY: usize = 32;

/// Usual length of a serial number
pub const SERIAL_NUMBER_DIGITS: usize = 15;

/// Return the payload of `fragment` if it starts with `tag` followed by a colon.
///
/// The comparison is exact and case-sensitive; `LED` does not match `LEDS:1`.
pub fn match_tag<'a>(tag: &str, fragment: &'a [u8]) -> Option<&'a [u8]> {
    let tag = tag.as_bytes();
    if fragment.len() < tag.len() + 1 {
        return None;
    }
    if &fragment[..tag.len()] == tag && fragment[tag.len()] == b':' {
        Some(&fragment[tag.len() + 1..])
    } else {
        None
    }
}

/// Decimal integer field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntValue {
    tag: &'static str,
    value: Option<i32>,
}

impl IntValue {
    pub const fn new(tag: &'static str) -> Self {
        IntValue { tag, value: None }
    }

    pub fn value(&self) -> Option<i32> {
        self.value
    }

    fn parse(&mut self, fragment: &[u8]) -> Result<(), ParseError> {
        let payload = match_tag(self.tag, fragment).ok_or(ParseError::TagMismatch)?;
        let text = core::str::from_utf8(payload).map_err(|_| ParseError::InvalidUtf8)?;
        let value = text.trim().parse::<i32>().map_err(|_| ParseError::InvalidInt)?;
        self.value = Some(value);
        Ok(())
    }
}

/// Fixed-size serial number field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumberValue {
    tag: &'static str,
    buf: [u8; SERIAL_NUMBER_CAPACITY],
    len: usize,
    set: bool,
}

impl SerialNumberValue {
    pub const fn new(tag: &'static str) -> Self {
        SerialNumberValue {
            tag,
            buf: [0; SERIAL_NUMBER_CAPACITY],
            len: 0,
            set: false,
        }
    }

    /// Serial number text, `None` until one was received
    pub fn as_str(&self) -> Option<&str> {
        if !self.set {
            return None;
        }
        core::str::from_utf8(&self.buf[..self.len]).ok()
    }

    /// Single character of the serial number
    pub fn digit(&self, index: usize) -> Option<u8> {
        if !self.set || index >= self.len {
            return None;
        }
        Some(self.buf[index])
    }

    fn parse(&mut self, fragment: &[u8]) -> Result<(), ParseError> {
        let payload = match_tag(self.tag, fragment).ok_or(ParseError::TagMismatch)?;
        // One byte stays reserved for the terminator.
        let capacity = SERIAL_NUMBER_CAPACITY - 1;
        if payload.len() > capacity {
            return Err(ParseError::PayloadOverflow {
                len: payload.len(),
                capacity,
            });
        }
        core::str::from_utf8(payload).map_err(|_| ParseError::InvalidUtf8)?;
        self.buf = [0; SERIAL_NUMBER_CAPACITY];
        self.buf[..payload.len()].copy_from_slice(payload);
        self.len = payload.len();
        self.set = true;
        Ok(())
    }
}

/// A value the module wants from the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedValue {
    Int(IntValue),
    SerialNumber(SerialNumberValue),
}

impl TaggedValue {
    pub const fn int(tag: &'static str) -> Self {
        TaggedValue::Int(IntValue::new(tag))
    }

    pub const fn serial_number(tag: &'static str) -> Self {
        TaggedValue::SerialNumber(SerialNumberValue::new(tag))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TaggedValue::Int(v) => v.tag,
            TaggedValue::SerialNumber(v) => v.tag,
        }
    }

    /// True once a value was parsed successfully
    pub fn has_value(&self) -> bool {
        match self {
            TaggedValue::Int(v) => v.value.is_some(),
            TaggedValue::SerialNumber(v) => v.set,
        }
    }

    /// Offer a fragment to this value.
    ///
    /// On any error the previous value and `has_value()` are left as they were.
    pub fn parse(&mut self, fragment: &[u8]) -> Result<(), ParseError> {
        match self {
            TaggedValue::Int(v) => v.parse(fragment),
            TaggedValue::SerialNumber(v) => v.parse(fragment),
        }
    }

    /// Forget the received value so the tag can be negotiated again
    pub fn clear(&mut self) {
        match self {
            TaggedValue::Int(v) => v.value = None,
            TaggedValue::SerialNumber(v) => {
                v.buf = [0; SERIAL_NUMBER_CAPACITY];
                v.len = 0;
                v.set = false;
            }
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            TaggedValue::Int(v) => v.value(),
            TaggedValue::SerialNumber(_) => None,
        }
    }

    pub fn as_serial_number(&self) -> Option<&SerialNumberValue> {
        match self {
            TaggedValue::SerialNumber(v) if v.set => Some(v),
            _ => None,
        }
    }
}

/// Offer one fragment to the interest set; the first value that takes it wins.
///
/// Returns the index of the value that was updated.
pub fn offer_fragment(tags: &mut [TaggedValue], fragment: &[u8]) -> Option<usize> {
    for (i, tag) in tags.iter_mut().enumerate() {
        match tag.parse(fragment) {
            Ok(()) => return Some(i),
            Err(ParseError::TagMismatch) => continue,
            Err(e) => {
                log::debug!("Tag '{}' rejected fragment: {}", tag.tag(), e);
                return None;
            }
        }
    }
    None
}

/// Number of values in the set that are still waiting for the controller
pub fn missing(tags: &[TaggedValue]) -> usize {
    tags.iter().filter(|t| !t.has_value()).count()
}
