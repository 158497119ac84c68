//! Brazilian document, phone and CEP handling.
//!
//! The `format_*` functions are input masks: they accept partially typed
//! values and format as many digits as are present, dropping anything beyond
//! the mask. The `parse`/`validate_*` functions are strict.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CPF_MASK: &str = "###.###.###-##";
const CNPJ_MASK: &str = "##.###.###/####-##";
const ZIP_MASK: &str = "#####-###";
const MOBILE_MASK: &str = "(##) #####-####";
const LANDLINE_MASK: &str = "(##) ####-####";

const CNPJ_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Errors returned by the strict parsers in this module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("CPF inválido")]
    InvalidCpf,
    #[error("CNPJ inválido")]
    InvalidCnpj,
    #[error("documento deve ter 11 (CPF) ou 14 (CNPJ) dígitos")]
    InvalidLength,
    #[error("CEP deve ter 8 dígitos")]
    InvalidZipCode,
    #[error("telefone deve ter DDD e 8 ou 9 dígitos")]
    InvalidPhone,
}

/// Keep only ASCII digits.
#[must_use]
pub fn only_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Fill `mask` (`#` = digit) with the digits of `input`.
///
/// Literal characters are emitted only while digits remain, so partial input
/// formats progressively.
fn apply_mask(input: &str, mask: &str) -> String {
    let mut digits = input.chars().filter(char::is_ascii_digit).peekable();
    let mut out = String::with_capacity(mask.len());

    for slot in mask.chars() {
        if digits.peek().is_none() {
            break;
        }
        if slot == '#' {
            if let Some(d) = digits.next() {
                out.push(d);
            }
        } else {
            out.push(slot);
        }
    }

    out
}

/// Strip a leading `55` country code from 12/13 digit phone numbers.
fn national_phone_digits(s: &str) -> String {
    let digits = only_digits(s);
    match digits.len() {
        12 | 13 if digits.starts_with("55") => digits.get(2..).unwrap_or_default().to_owned(),
        _ => digits,
    }
}

/// Format a phone number as `(11) 98765-4321` or `(11) 3456-7890`.
#[must_use]
pub fn format_phone(s: &str) -> String {
    let digits = national_phone_digits(s);
    let mask = if digits.len() > 10 {
        MOBILE_MASK
    } else {
        LANDLINE_MASK
    };
    apply_mask(&digits, mask)
}

/// Format a CEP as `01310-100`.
#[must_use]
pub fn format_zip_code(s: &str) -> String {
    apply_mask(s, ZIP_MASK)
}

/// Format a CPF (up to 11 digits) or a CNPJ (more than 11 digits).
#[must_use]
pub fn format_document(s: &str) -> String {
    let digits = only_digits(s);
    let mask = if digits.len() <= 11 { CPF_MASK } else { CNPJ_MASK };
    apply_mask(&digits, mask)
}

fn to_numbers(digits: &str) -> Vec<u32> {
    digits.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(numbers: &[u32]) -> bool {
    numbers.windows(2).all(|w| w.first() == w.get(1))
}

fn cpf_check_digit(numbers: &[u32]) -> u32 {
    let len = u32::try_from(numbers.len()).unwrap_or(0);
    let sum: u32 = numbers
        .iter()
        .zip((2..=len + 1).rev())
        .map(|(d, w)| d * w)
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 { 0 } else { rest }
}

fn cnpj_check_digit(numbers: &[u32]) -> u32 {
    // First digit uses the last 12 weights, second uses all 13
    let weights = CNPJ_WEIGHTS
        .get(CNPJ_WEIGHTS.len() - numbers.len()..)
        .unwrap_or(&CNPJ_WEIGHTS);
    let sum: u32 = numbers.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 { 0 } else { 11 - rest }
}

/// Validate a CPF, formatted or not.
///
/// Sequences of a single repeated digit (e.g. `111.111.111-11`) pass the
/// checksum but are rejected.
#[must_use]
pub fn validate_cpf(s: &str) -> bool {
    let numbers = to_numbers(&only_digits(s));
    if numbers.len() != 11 || all_same(&numbers) {
        return false;
    }
    let (Some(body), Some(&dv1), Some(&dv2)) =
        (numbers.get(..9), numbers.get(9), numbers.get(10))
    else {
        return false;
    };
    if cpf_check_digit(body) != dv1 {
        return false;
    }
    numbers
        .get(..10)
        .is_some_and(|first_ten| cpf_check_digit(first_ten) == dv2)
}

/// Validate a CNPJ, formatted or not.
#[must_use]
pub fn validate_cnpj(s: &str) -> bool {
    let numbers = to_numbers(&only_digits(s));
    if numbers.len() != 14 || all_same(&numbers) {
        return false;
    }
    let (Some(body), Some(&dv1), Some(&dv2)) =
        (numbers.get(..12), numbers.get(12), numbers.get(13))
    else {
        return false;
    };
    if cnpj_check_digit(body) != dv1 {
        return false;
    }
    numbers
        .get(..13)
        .is_some_and(|first_thirteen| cnpj_check_digit(first_thirteen) == dv2)
}

/// A validated taxpayer document, stored as digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Document {
    /// Individual (11 digits).
    Cpf(String),
    /// Company (14 digits).
    Cnpj(String),
}

impl Document {
    /// Parse a CPF or CNPJ, choosing by digit count.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] if the length is wrong or the check digits
    /// do not match.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        let digits = only_digits(s);
        match digits.len() {
            11 if validate_cpf(&digits) => Ok(Self::Cpf(digits)),
            11 => Err(DocumentError::InvalidCpf),
            14 if validate_cnpj(&digits) => Ok(Self::Cnpj(digits)),
            14 => Err(DocumentError::InvalidCnpj),
            _ => Err(DocumentError::InvalidLength),
        }
    }

    /// Digits only.
    #[must_use]
    pub fn digits(&self) -> &str {
        match self {
            Self::Cpf(d) | Self::Cnpj(d) => d,
        }
    }

    /// Gateway `document_type` value.
    #[must_use]
    pub const fn document_type(&self) -> &'static str {
        match self {
            Self::Cpf(_) => "CPF",
            Self::Cnpj(_) => "CNPJ",
        }
    }

    /// Gateway customer `type` value.
    #[must_use]
    pub const fn customer_type(&self) -> &'static str {
        match self {
            Self::Cpf(_) => "individual",
            Self::Cnpj(_) => "company",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_document(self.digits()))
    }
}

impl TryFrom<String> for Document {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Document> for String {
    fn from(document: Document) -> Self {
        match document {
            Document::Cpf(d) | Document::Cnpj(d) => d,
        }
    }
}

/// A CEP (postal code), 8 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Parse a CEP, formatted or not.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidZipCode`] unless exactly 8 digits are
    /// present and nothing but digits, spaces, dots or a dash surround them.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        let s = s.trim();
        if s.chars().any(|c| !(c.is_ascii_digit() || matches!(c, '-' | '.' | ' '))) {
            return Err(DocumentError::InvalidZipCode);
        }
        let digits = only_digits(s);
        if digits.len() == 8 {
            Ok(Self(digits))
        } else {
            Err(DocumentError::InvalidZipCode)
        }
    }

    /// Digits only.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_zip_code(&self.0))
    }
}

impl TryFrom<String> for ZipCode {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

/// A Brazilian phone number split into DDD and subscriber number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phone {
    /// Two digit area code (DDD).
    pub area_code: String,
    /// Eight (landline) or nine (mobile) digits.
    pub number: String,
}

impl Phone {
    /// Country calling code used for every number.
    pub const COUNTRY_CODE: &'static str = "55";

    /// Parse a phone number, with or without the `55` country code.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidPhone`] unless 10 or 11 national digits
    /// are present.
    pub fn parse(s: &str) -> Result<Self, DocumentError> {
        let digits = national_phone_digits(s);
        if !matches!(digits.len(), 10 | 11) || digits.starts_with('0') {
            return Err(DocumentError::InvalidPhone);
        }
        let (area_code, number) = digits.split_at(2);
        Ok(Self {
            area_code: area_code.to_owned(),
            number: number.to_owned(),
        })
    }

    /// Whether this is a nine digit mobile number.
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.number.len() == 9
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_phone(&format!("{}{}", self.area_code, self.number)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const VALID_CPF: &str = "52998224725";
    const VALID_CNPJ: &str = "11222333000181";

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_phone("1134567890"), "(11) 3456-7890");
        assert_eq!(format_phone("+55 11 98765-4321"), "(11) 98765-4321");
        assert_eq!(format_phone("1198"), "(11) 98");
        assert_eq!(format_phone(""), "");
    }

    #[test]
    fn test_format_zip_code() {
        assert_eq!(format_zip_code("01310100"), "01310-100");
        assert_eq!(format_zip_code("01310"), "01310");
        assert_eq!(format_zip_code("013101"), "01310-1");
        assert_eq!(format_zip_code("0131010099"), "01310-100");
    }

    #[test]
    fn test_format_document_branches_by_length() {
        assert_eq!(format_document(VALID_CPF), "529.982.247-25");
        assert_eq!(format_document(VALID_CNPJ), "11.222.333/0001-81");
        assert_eq!(format_document("5299"), "529.9");
        assert_eq!(format_document("529.982.247-25"), "529.982.247-25");
    }

    #[test]
    fn test_validate_cpf() {
        assert!(validate_cpf(VALID_CPF));
        assert!(validate_cpf("529.982.247-25"));
        assert!(!validate_cpf("52998224724"));
        assert!(!validate_cpf("11111111111"));
        assert!(!validate_cpf("00000000000"));
        assert!(!validate_cpf("5299822472"));
    }

    #[test]
    fn test_validate_cnpj() {
        assert!(validate_cnpj(VALID_CNPJ));
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(!validate_cnpj("11222333000182"));
        assert!(!validate_cnpj("22222222222222"));
        assert!(!validate_cnpj(VALID_CPF));
    }

    #[test]
    fn test_document_parse() {
        let cpf = Document::parse("529.982.247-25").unwrap();
        assert_eq!(cpf, Document::Cpf(VALID_CPF.to_owned()));
        assert_eq!(cpf.document_type(), "CPF");
        assert_eq!(cpf.customer_type(), "individual");
        assert_eq!(cpf.to_string(), "529.982.247-25");

        let cnpj = Document::parse(VALID_CNPJ).unwrap();
        assert_eq!(cnpj.customer_type(), "company");

        assert_eq!(Document::parse("11111111111"), Err(DocumentError::InvalidCpf));
        assert_eq!(Document::parse("123"), Err(DocumentError::InvalidLength));
    }

    #[test]
    fn test_zip_code_parse() {
        assert_eq!(ZipCode::parse("01310-100").unwrap().as_str(), "01310100");
        assert!(ZipCode::parse("0131010").is_err());
        assert!(ZipCode::parse("01310-10a").is_err());
        assert_eq!(ZipCode::parse("01310100").unwrap().to_string(), "01310-100");
    }

    #[test]
    fn test_phone_parse() {
        let phone = Phone::parse("(11) 98765-4321").unwrap();
        assert_eq!(phone.area_code, "11");
        assert_eq!(phone.number, "987654321");
        assert!(phone.is_mobile());
        assert!(Phone::parse("98765-4321").is_err());
        assert!(Phone::parse("5511987654321").is_ok());
    }
}
