// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Satellite network user identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

const MIN_DIGITS: usize = 3;
const MAX_DIGITS: usize = 15;

/// A phone-number-shaped identifier for a party on the satellite network.
///
/// The only way to obtain one is [`UserId::parse`], so holding a `UserId`
/// means the value has already been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parse raw user input.
    ///
    /// Accepts an optional leading `+` and ignores spaces, dashes and
    /// parentheses. What remains must be 3 to 15 ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyUserId);
        }

        let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let mut digits = String::with_capacity(body.len());
        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' => {}
                _ => return Err(ValidationError::InvalidUserId(raw.to_string())),
            }
        }

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(ValidationError::InvalidUserId(raw.to_string()));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_digits() {
        assert_eq!(UserId::parse("12345").unwrap().as_str(), "12345");
        assert_eq!(UserId::parse("5551234").unwrap().as_str(), "5551234");
    }

    #[test]
    fn test_formatted_number() {
        let id = UserId::parse(" +1 (555) 123-4567 ").unwrap();
        assert_eq!(id.as_str(), "15551234567");
        assert_eq!(id.to_string(), "15551234567");
    }

    #[test]
    fn test_rejects_empty_and_letters() {
        assert_eq!(UserId::parse(""), Err(ValidationError::EmptyUserId));
        assert_eq!(UserId::parse("   "), Err(ValidationError::EmptyUserId));
        assert!(matches!(
            UserId::parse("abc"),
            Err(ValidationError::InvalidUserId(_))
        ));
        assert!(UserId::parse("555x1234").is_err());
        assert!(UserId::parse("++5551234").is_err());
    }

    #[test]
    fn test_length_bounds() {
        assert!(UserId::parse("12").is_err());
        assert!(UserId::parse("123").is_ok());
        assert!(UserId::parse("123456789012345").is_ok());
        assert!(UserId::parse("1234567890123456").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let id: UserId = serde_json::from_str("\"5551234\"").unwrap();
        assert_eq!(id.as_str(), "5551234");
        assert!(serde_json::from_str::<UserId>("\"nope\"").is_err());
    }
}
