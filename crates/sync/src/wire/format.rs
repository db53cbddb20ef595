use std::str::FromStr;

pub const FIELD_SEPARATOR: &str = ",";
pub const SUB_FIELD_SEPARATOR: &str = ":";
pub const GROUP_SEPARATOR: &str = "#";
pub const BLOCK_SEPARATOR: &str = "|";
pub const LEG_SEPARATOR: &str = "/";

pub const SHORT_PREFIX: &str = "OS";
pub const FULL_STATE_PREFIX: &str = "BC";
pub const SCENARIO_PREFIX: &str = "SC";
pub const SHUTDOWN_PAYLOAD: &str = "SD";
pub const COMMAND_PREFIX: &str = "MC";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("unknown payload prefix in {0:?}")]
    UnknownPrefix(String),
    #[error("group {index} missing")]
    MissingGroup { index: usize },
    #[error("group {group} field {index} missing")]
    MissingField { group: usize, index: usize },
    #[error("group {group} field {index} is not a valid value: {value:?}")]
    InvalidField {
        group: usize,
        index: usize,
        value: String,
    },
    #[error("group {group} announces {expected} entries but carries {found}")]
    CountMismatch {
        group: usize,
        expected: usize,
        found: usize,
    },
}

/// Strips the NUL terminator and whitespace some senders leave on a datagram.
pub fn clean_payload(raw: &str) -> &str {
    raw.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Positional access to one delimited group.
///
/// Extra trailing fields are ignored so that appending to a group stays compatible.
#[derive(Debug)]
pub struct FieldReader<'a> {
    group: usize,
    fields: Vec<&'a str>,
}

impl<'a> FieldReader<'a> {
    pub fn new(group: usize, text: &'a str, separator: &str) -> Self {
        Self {
            group,
            fields: text.split(separator).collect(),
        }
    }

    pub fn raw(&self, index: usize) -> Result<&'a str, DecodeError> {
        self.fields
            .get(index)
            .copied()
            .ok_or(DecodeError::MissingField {
                group: self.group,
                index,
            })
    }

    pub fn get<T: FromStr>(&self, index: usize) -> Result<T, DecodeError> {
        let value = self.raw(index)?;
        value.trim().parse().map_err(|_| DecodeError::InvalidField {
            group: self.group,
            index,
            value: value.to_string(),
        })
    }

    pub fn flag(&self, index: usize) -> Result<bool, DecodeError> {
        Ok(self.get::<i32>(index)? != 0)
    }
}

/// Splits a group into `|` separated blocks; an empty group has no blocks.
pub fn blocks(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split(BLOCK_SEPARATOR).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_parses_positionally() {
        let reader = FieldReader::new(1, "1.5, 2 ,x", FIELD_SEPARATOR);
        assert_eq!(reader.get::<f32>(0).unwrap(), 1.5);
        assert_eq!(reader.get::<u32>(1).unwrap(), 2);
        assert_eq!(
            reader.get::<f32>(2),
            Err(DecodeError::InvalidField {
                group: 1,
                index: 2,
                value: "x".into()
            })
        );
        assert_eq!(
            reader.get::<f32>(3),
            Err(DecodeError::MissingField { group: 1, index: 3 })
        );
    }

    #[test]
    fn empty_group_has_no_blocks() {
        assert!(blocks("").is_empty());
        assert_eq!(blocks("1,2|3,4"), vec!["1,2", "3,4"]);
    }

    #[test]
    fn clean_strips_terminator() {
        assert_eq!(clean_payload("OS1,2\0"), "OS1,2");
        assert_eq!(clean_payload("  SD \n"), "SD");
    }
}
