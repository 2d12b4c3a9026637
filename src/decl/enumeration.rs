//! Enum declarations: an integer container plus a label/range table.

use crate::error::MetadataError;

use super::integer::IntegerDeclaration;

/// One enumerator: a label covering an inclusive value range.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumRange {
    pub label: String,
    pub low: i64,
    pub high: i64,
}

/// An enumeration over an integer container.
///
/// Enumerators are kept in declaration order. Ranges may not overlap and
/// must fit within the container's representable range.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumDeclaration {
    pub container: IntegerDeclaration,
    pub ranges: Vec<EnumRange>,
}

impl EnumDeclaration {
    pub fn new(container: IntegerDeclaration) -> Self {
        EnumDeclaration {
            container,
            ranges: Vec::new(),
        }
    }

    /// Add an enumerator covering `[low, high]`.
    pub fn add(&mut self, low: i64, high: i64, label: &str) -> Result<(), MetadataError> {
        if low > high {
            return Err(MetadataError::ValueRange {
                construct: format!("enumerator {label}"),
                message: format!("range [{low}, {high}] is inverted"),
            });
        }
        if low < self.container.min_value() || high > self.container.max_value() {
            return Err(MetadataError::ValueRange {
                construct: format!("enumerator {label}"),
                message: format!(
                    "range [{low}, {high}] does not fit a {}-bit {} container",
                    self.container.length,
                    if self.container.signed { "signed" } else { "unsigned" }
                ),
            });
        }
        for existing in &self.ranges {
            if low <= existing.high && existing.low <= high {
                return Err(MetadataError::ValueRange {
                    construct: format!("enumerator {label}"),
                    message: format!(
                        "range [{low}, {high}] overlaps {} [{}, {}]",
                        existing.label, existing.low, existing.high
                    ),
                });
            }
        }
        self.ranges.push(EnumRange {
            label: label.to_string(),
            low,
            high,
        });
        Ok(())
    }

    /// Add an enumerator with no explicit value: it continues one past the
    /// previous enumerator's high end, starting at 0.
    pub fn add_next(&mut self, label: &str) -> Result<(), MetadataError> {
        let value = match self.ranges.last() {
            Some(last) => last.high.checked_add(1).ok_or_else(|| MetadataError::ValueRange {
                construct: format!("enumerator {label}"),
                message: "implicit value overflows".to_string(),
            })?,
            None => 0,
        };
        self.add(value, value, label)
    }

    /// Label for a decoded container value, if any enumerator covers it.
    pub fn query(&self, value: i64) -> Option<&str> {
        self.ranges
            .iter()
            .find(|r| r.low <= value && value <= r.high)
            .map(|r| r.label.as_str())
    }

    /// All labels, in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.ranges.iter().map(|r| r.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{ByteOrder, DisplayBase, Encoding};

    fn container(length: u32, signed: bool) -> IntegerDeclaration {
        IntegerDeclaration::new(
            length,
            signed,
            DisplayBase::Decimal,
            Some(ByteOrder::Little),
            Encoding::None,
            1,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_implicit_continuation() {
        let mut e = EnumDeclaration::new(container(8, false));
        e.add_next("A").unwrap();
        e.add(5, 5, "B").unwrap();
        e.add_next("C").unwrap();
        assert_eq!(e.ranges[0].low, 0);
        assert_eq!(e.ranges[0].high, 0);
        assert_eq!(e.ranges[1].low, 5);
        assert_eq!(e.ranges[2].low, 6);
        assert_eq!(e.ranges[2].high, 6);
    }

    #[test]
    fn test_overlap_rejected() {
        let mut e = EnumDeclaration::new(container(8, false));
        e.add_next("A").unwrap();
        e.add(5, 5, "B").unwrap();
        e.add_next("C").unwrap();
        // [0, 2] intersects A's [0, 0].
        assert!(e.add(0, 2, "D").is_err());
        // [5, 7] intersects both B and C.
        assert!(e.add(5, 7, "E").is_err());
        // [2, 2] touches nothing.
        assert!(e.add(2, 2, "F").is_ok());
    }

    #[test]
    fn test_container_range_enforced() {
        let mut e = EnumDeclaration::new(container(5, false));
        assert!(e.add(0, 31, "ok").is_ok());
        let mut e = EnumDeclaration::new(container(5, false));
        assert!(e.add(0, 32, "too big").is_err());
        let mut e = EnumDeclaration::new(container(5, false));
        assert!(e.add(-1, 0, "negative in unsigned").is_err());
        let mut e = EnumDeclaration::new(container(8, true));
        assert!(e.add(-128, 127, "signed full").is_ok());
    }

    #[test]
    fn test_query() {
        let mut e = EnumDeclaration::new(container(8, false));
        e.add(0, 30, "compact").unwrap();
        e.add(31, 31, "extended").unwrap();
        assert_eq!(e.query(7), Some("compact"));
        assert_eq!(e.query(31), Some("extended"));
        assert_eq!(e.query(32), None);
    }
}
