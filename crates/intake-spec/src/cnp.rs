//! Romanian personal numeric code (CNP).
//!
//! Layout: `S YY MM DD JJ NNN C` where `S` encodes gender and century, `JJ` the
//! county of registration, `NNN` a sequence number and `C` the control digit.

use chrono::NaiveDate;
use thiserror::Error;

use crate::patient::Gender;

const CONTROL_WEIGHTS: [u32; 12] = [2, 7, 9, 1, 4, 6, 3, 5, 8, 2, 7, 9];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CnpError {
    #[error("CNP must contain only digits")]
    NonDigit,
    #[error("CNP must have exactly 13 digits, got {0}")]
    Length(usize),
    #[error("CNP gender digit {0} is not valid")]
    GenderDigit(u32),
    #[error("CNP encodes an invalid birth date")]
    BirthDate,
    #[error("CNP county code {0:02} is not assigned")]
    County(u32),
    #[error("CNP sequence number cannot be 000")]
    Sequence,
    #[error("CNP control digit is {found}, expected {expected}")]
    Checksum { expected: u32, found: u32 },
}

/// A CNP whose structure has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnp {
    digits: [u32; 13],
    birth_date: NaiveDate,
}

impl Cnp {
    /// Checks format, gender digit, birth date, county and sequence. The control
    /// digit is not enforced; see [`Cnp::parse_strict`].
    pub fn parse(raw: &str) -> Result<Self, CnpError> {
        let raw = raw.trim();
        let mut digits = [0u32; 13];
        let mut count = 0usize;
        for ch in raw.chars() {
            let digit = ch.to_digit(10).ok_or(CnpError::NonDigit)?;
            if count < digits.len() {
                digits[count] = digit;
            }
            count += 1;
        }
        if count != digits.len() {
            return Err(CnpError::Length(count));
        }

        let century = match digits[0] {
            1 | 2 | 7 | 8 | 9 => 1900,
            3 | 4 => 1800,
            5 | 6 => 2000,
            other => return Err(CnpError::GenderDigit(other)),
        };
        let year = century + (digits[1] * 10 + digits[2]) as i32;
        let month = digits[3] * 10 + digits[4];
        let day = digits[5] * 10 + digits[6];
        let birth_date = NaiveDate::from_ymd_opt(year, month, day).ok_or(CnpError::BirthDate)?;

        let county = digits[7] * 10 + digits[8];
        if !matches!(county, 1..=48 | 51 | 52 | 70) {
            return Err(CnpError::County(county));
        }
        if digits[9] == 0 && digits[10] == 0 && digits[11] == 0 {
            return Err(CnpError::Sequence);
        }

        Ok(Self { digits, birth_date })
    }

    /// [`Cnp::parse`] plus the control digit.
    pub fn parse_strict(raw: &str) -> Result<Self, CnpError> {
        let cnp = Self::parse(raw)?;
        let expected = cnp.expected_control_digit();
        let found = cnp.control_digit();
        if expected != found {
            return Err(CnpError::Checksum { expected, found });
        }
        Ok(cnp)
    }

    /// `None` for foreign citizens (gender digit 9).
    pub fn gender(&self) -> Option<Gender> {
        match self.digits[0] {
            9 => None,
            digit if digit % 2 == 1 => Some(Gender::Male),
            _ => Some(Gender::Female),
        }
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn county_code(&self) -> u32 {
        self.digits[7] * 10 + self.digits[8]
    }

    pub fn control_digit(&self) -> u32 {
        self.digits[12]
    }

    pub fn expected_control_digit(&self) -> u32 {
        let sum: u32 = self.digits[..12]
            .iter()
            .zip(CONTROL_WEIGHTS)
            .map(|(digit, weight)| digit * weight)
            .sum();
        match sum % 11 {
            10 => 1,
            rest => rest,
        }
    }

    pub fn has_valid_checksum(&self) -> bool {
        self.expected_control_digit() == self.control_digit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_structure() {
        let cnp = Cnp::parse("1850101123456").expect("valid format");
        assert_eq!(cnp.gender(), Some(Gender::Male));
        assert_eq!(cnp.birth_date(), NaiveDate::from_ymd_opt(1985, 1, 1).unwrap());
        assert_eq!(cnp.county_code(), 12);
    }

    #[test]
    fn strict_parse_checks_control_digit() {
        assert_eq!(
            Cnp::parse_strict("1850101123456"),
            Err(CnpError::Checksum {
                expected: 1,
                found: 6
            })
        );
        assert!(Cnp::parse_strict("1850101123451").is_ok());
    }

    #[test]
    fn century_follows_gender_digit() {
        let cnp = Cnp::parse("6050101123451").expect("valid format");
        assert_eq!(cnp.gender(), Some(Gender::Female));
        assert_eq!(cnp.birth_date(), NaiveDate::from_ymd_opt(2005, 1, 1).unwrap());
    }

    #[test]
    fn rejects_malformed_values() {
        assert_eq!(Cnp::parse("abc"), Err(CnpError::NonDigit));
        assert_eq!(Cnp::parse("123"), Err(CnpError::Length(3)));
        assert_eq!(Cnp::parse("0850101123456"), Err(CnpError::GenderDigit(0)));
        assert_eq!(Cnp::parse("1851301123456"), Err(CnpError::BirthDate));
        assert_eq!(Cnp::parse("1850101493456"), Err(CnpError::County(49)));
        assert_eq!(Cnp::parse("1850101120006"), Err(CnpError::Sequence));
    }
}
