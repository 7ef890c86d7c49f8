use std::fmt::Display;

use anyhow::{Result, bail};
use chrono::{Datelike, Utc};
use mockall::automock;
use rand::Rng;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "INV";
const SUFFIX_DIGITS: usize = 6;
const SUFFIX_SPACE: u32 = 1_000_000;

/// Human-readable invoice identifier of the shape `INV-{year}-{6 digits}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn new(year: i32, suffix: u32) -> Result<Self> {
        if !(0..=9999).contains(&year) {
            bail!("invoice number year out of range: {year}");
        }
        if suffix >= SUFFIX_SPACE {
            bail!("invoice number suffix out of range: {suffix}");
        }
        Ok(Self(format!(
            "{PREFIX}-{year}-{suffix:0width$}",
            width = SUFFIX_DIGITS
        )))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('-');
        let (Some(prefix), Some(year), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            bail!("Invalid invoice number: {raw}");
        };

        let digits_only = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if prefix != PREFIX
            || year.len() != 4
            || !digits_only(year)
            || suffix.len() != SUFFIX_DIGITS
            || !digits_only(suffix)
        {
            bail!("Invalid invoice number: {raw}");
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of candidate invoice numbers. Uniqueness is enforced by the ledger's unique
/// index, not here; callers retry with a fresh candidate on collision.
#[automock]
pub trait InvoiceNumberAllocator: Send + Sync {
    fn allocate(&self) -> InvoiceNumber;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomInvoiceNumberAllocator;

impl InvoiceNumberAllocator for RandomInvoiceNumberAllocator {
    fn allocate(&self) -> InvoiceNumber {
        let year = Utc::now().year();
        let suffix = rand::thread_rng().gen_range(0..SUFFIX_SPACE);
        // Both components are in range by construction.
        InvoiceNumber(format!(
            "{PREFIX}-{year:04}-{suffix:0width$}",
            width = SUFFIX_DIGITS
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_zero_padded() {
        let number = InvoiceNumber::new(2024, 123).unwrap();
        assert_eq!(number.as_str(), "INV-2024-000123");
    }

    #[test]
    fn out_of_range_suffix_is_rejected() {
        assert!(InvoiceNumber::new(2024, 1_000_000).is_err());
    }

    #[test]
    fn allocated_numbers_use_the_current_year_and_parse_back() {
        let allocator = RandomInvoiceNumberAllocator;
        let year = Utc::now().year();
        for _ in 0..50 {
            let number = allocator.allocate();
            assert!(
                number.as_str().starts_with(&format!("INV-{year}-")),
                "got: {number}"
            );
            assert_eq!(InvoiceNumber::parse(number.as_str()).unwrap(), number);
        }
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for raw in [
            "",
            "INV-2024-12345",
            "INV-2024-1234567",
            "INV-24-000123",
            "INV-2024-00012a",
            "ABC-2024-000123",
            "INV-2024-000123-1",
            "INV2024000123",
        ] {
            let err = InvoiceNumber::parse(raw).unwrap_err().to_string();
            assert!(err.contains("Invalid invoice number"), "got: {err}");
        }
    }
}
