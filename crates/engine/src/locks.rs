//! Region locking: collision-free placeholder tokens that shield emitted
//! LaTeX from the rules that run after it was produced.

use log::{debug, warn};
use rand::Rng;
use std::ops::Range;

/// Characters a lock token is drawn from. Deliberately free of LaTeX
/// syntax, markup delimiters, and anything the escape rules touch.
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How many candidates to sample at one length before widening the token.
const SAMPLES_PER_LENGTH: usize = 64;

/// Upper bound on unlock sweeps; nesting depth in practice is tiny.
const MAX_UNLOCK_PASSES: usize = 64;

/// Replaces a span of the buffer with `text`, without locking.
pub fn splice(buffer: &mut String, range: Range<usize>, text: &str) {
    buffer.replace_range(range, text);
}

/// The table of live lock tokens and the text they stand in for.
///
/// Locking replaces a span with a token of the same byte length that is
/// guaranteed absent from the buffer and from every stowed span, so no
/// rule pattern and no other token can ever touch it. Unlocking restores
/// all stowed spans, sweeping repeatedly so tokens nested inside other
/// locked spans (from recursive conversion) resolve too.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Vec<(String, String)>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locks an existing span of the buffer behind a fresh token.
    /// Locking an empty span is a no-op and returns an empty token.
    pub fn lock(&mut self, buffer: &mut String, range: Range<usize>) -> String {
        let original = buffer[range.clone()].to_string();
        if original.is_empty() {
            return String::new();
        }
        let token = self.fresh_token(buffer, original.len());
        buffer.replace_range(range, &token);
        self.entries.push((token.clone(), original));
        token
    }

    /// Replaces a span with `text` and immediately locks the inserted
    /// text. Inserting empty text skips the lock.
    pub fn splice_and_lock(
        &mut self,
        buffer: &mut String,
        range: Range<usize>,
        text: &str,
    ) -> String {
        let start = range.start;
        buffer.replace_range(range, text);
        if text.is_empty() {
            return String::new();
        }
        self.lock(buffer, start..start + text.len())
    }

    /// Restores every locked span, innermost tokens last. Tokens that no
    /// longer appear anywhere (a later rule destroyed one, which locking
    /// is designed to prevent) are dropped with a warning.
    pub fn unlock_all(&mut self, buffer: &mut String) {
        let mut pending = std::mem::take(&mut self.entries);
        let mut passes = 0;
        while !pending.is_empty() {
            passes += 1;
            if passes > MAX_UNLOCK_PASSES {
                warn!(
                    "unlock did not converge after {} passes; {} tokens left",
                    MAX_UNLOCK_PASSES,
                    pending.len()
                );
                break;
            }
            let before = pending.len();
            pending.retain(|(token, original)| match buffer.find(token.as_str()) {
                Some(at) => {
                    buffer.replace_range(at..at + token.len(), original);
                    false
                }
                None => true,
            });
            if pending.len() == before {
                break;
            }
        }
        for (token, _) in pending {
            warn!("lock token '{}' vanished from the buffer; its span is lost", token);
        }
    }

    /// A candidate is usable when it appears nowhere a later restore
    /// could confuse it with: not in the buffer, not containing a live
    /// token, and not inside any stowed span.
    fn is_free(&self, buffer: &str, candidate: &str) -> bool {
        !buffer.contains(candidate)
            && !self.entries.iter().any(|(token, original)| {
                candidate.contains(token.as_str()) || original.contains(candidate)
            })
    }

    /// Samples tokens of the span's byte length, widening by one after
    /// every [`SAMPLES_PER_LENGTH`] collisions. Widening changes the
    /// buffer length; callers take the returned token's length as truth.
    fn fresh_token(&self, buffer: &str, span_len: usize) -> String {
        let mut rng = rand::rng();
        let mut length = span_len.max(1);
        let mut attempts = 0;
        loop {
            let candidate: String = (0..length)
                .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
                .collect();
            if self.is_free(buffer, &candidate) {
                return candidate;
            }
            attempts += 1;
            if attempts % SAMPLES_PER_LENGTH == 0 {
                debug!(
                    "token space crowded at length {}; widening to {}",
                    length,
                    length + 1
                );
                length += 1;
            }
        }
    }
}
