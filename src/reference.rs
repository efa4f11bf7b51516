use std::sync::atomic::{AtomicI64, Ordering};

use ulid::Ulid;

use crate::model::Ms;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TIME_LEN: usize = 8;
const RANDOM_LEN: usize = 4;
const PREFIX: &str = "WS";

/// Issues booking confirmation codes of the form `WS-XXXXXXXX-XXXX`.
///
/// The first token is the issue time in base 36, bumped by one millisecond
/// whenever two codes would share a timestamp, so codes from one generator
/// never collide. The second token is random.
pub struct ReferenceGenerator {
    last_ms: AtomicI64,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self {
            last_ms: AtomicI64::new(0),
        }
    }

    pub fn generate(&self, now: Ms) -> String {
        let stamp = self.next_stamp(now);
        let random = Ulid::new().random();
        format!(
            "{PREFIX}-{}-{}",
            base36_fixed(stamp as u128, TIME_LEN),
            base36_fixed(random, RANDOM_LEN)
        )
    }

    fn next_stamp(&self, now: Ms) -> Ms {
        let mut prev = self.last_ms.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_ms
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Lowest `len` base-36 digits of `value`, zero-padded.
fn base36_fixed(mut value: u128, len: usize) -> String {
    let mut out = vec![b'0'; len];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    // ALPHABET is ASCII.
    String::from_utf8(out).unwrap_or_default()
}

/// True for strings shaped like `WS-XXXXXXXX-XXXX` (uppercase alphanumerics).
pub fn is_well_formed(reference: &str) -> bool {
    let mut parts = reference.split('-');
    let ok = |part: Option<&str>, len: usize| {
        part.is_some_and(|p| {
            p.len() == len && p.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        })
    };
    parts.next() == Some(PREFIX)
        && ok(parts.next(), TIME_LEN)
        && ok(parts.next(), RANDOM_LEN)
        && parts.next().is_none()
}
