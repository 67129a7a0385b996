// ── FieldCoercer ──────────────────────────────────────────────────────────────

/// Tolerant integer coercion for report CSV fields.
///
/// Report cells may carry thousands separators, stray quotes, or locale
/// punctuation. Every character that is not an ASCII digit is discarded and
/// the remaining digits are read as a base-10 integer. An empty remainder
/// yields `0`, a remainder too large for `u64` saturates at `u64::MAX`;
/// coercion never fails.
pub struct FieldCoercer;

impl FieldCoercer {
    /// Coerce a string field.
    ///
    /// ```
    /// use stats_core::data_processors::FieldCoercer;
    ///
    /// assert_eq!(FieldCoercer::coerce("12a,3"), 123);
    /// assert_eq!(FieldCoercer::coerce(""), 0);
    /// ```
    pub fn coerce(field: &str) -> u64 {
        Self::coerce_bytes(field.as_bytes())
    }

    /// Coerce a raw byte field.
    pub fn coerce_bytes(field: &[u8]) -> u64 {
        let mut value: u64 = 0;

        for digit in field.iter().filter(|b| b.is_ascii_digit()) {
            value = match value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(digit - b'0')))
            {
                Some(v) => v,
                None => return u64::MAX,
            };
        }

        value
    }

    /// Coerce an optional field; a missing field counts as `0`.
    pub fn coerce_opt(field: Option<&[u8]>) -> u64 {
        field.map(Self::coerce_bytes).unwrap_or(0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
