//! Colorectal cancer diagnosis codes.
//!
//! CRC is `153`/`154` in ICD-9 and `C18`-`C21` in ICD-10. Codes are matched by prefix, so
//! `1534` and `C187` both count. Every check for a CRC code goes through these two predicates.
use once_cell::sync::Lazy;
use regex::Regex;

static CRC_ICD9: Lazy<Regex> = Lazy::new(|| Regex::new(r"^15[34]").unwrap());
static CRC_ICD10: Lazy<Regex> = Lazy::new(|| Regex::new(r"^C1[89]|^C2[01]").unwrap());

pub fn is_crc_icd9_code(code: &str) -> bool {
    CRC_ICD9.is_match(code)
}

pub fn is_crc_icd10_code(code: &str) -> bool {
    CRC_ICD10.is_match(code)
}

#[cfg(test)]
mod test {
    use super::{is_crc_icd10_code, is_crc_icd9_code};

    #[test]
    fn icd9() {
        for code in ["153", "1530", "1539", "154", "1541"] {
            assert!(is_crc_icd9_code(code), "{code}");
        }
        for code in ["152", "155", "2153", "", "C18"] {
            assert!(!is_crc_icd9_code(code), "{code}");
        }
    }

    #[test]
    fn icd10() {
        for code in ["C18", "C180", "C189", "C19", "C20", "C21", "C211"] {
            assert!(is_crc_icd10_code(code), "{code}");
        }
        for code in ["C17", "C22", "C1", "XC18", "c18", "D12", ""] {
            assert!(!is_crc_icd10_code(code), "{code}");
        }
    }
}
