use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serializer};
use std::{fs, io, path::Path};

/// Strings that mean "no value" in the source extracts.
pub const NULL_TOKENS: [&str; 3] = ["", " ", "NA"];

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.contains(&s) || NULL_TOKENS.contains(&s.trim())
}

// Helpers for serde to parse fields with quirks.

/// Parse a string, mapping the null tokens to `None`.
pub fn optional_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    if is_null_token(&s) {
        Ok(None)
    } else {
        Ok(Some(s.trim().to_owned()))
    }
}

/// Parse an integer, mapping the null tokens to `None`.
pub fn optional_int<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = optional_string(d)? else {
        return Ok(None);
    };
    s.parse()
        .map(Some)
        .map_err(|_| de::Error::custom(format!("expected an integer, found \"{}\"", s)))
}

/// Parse a number, mapping the null tokens to `None`.
pub fn optional_float<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = optional_string(d)? else {
        return Ok(None);
    };
    s.parse()
        .map(Some)
        .map_err(|_| de::Error::custom(format!("expected a number, found \"{}\"", s)))
}

/// Parse a '1' to `true` and a '0' to `false`, and the null tokens to `None`.
pub fn optional_flag<'de, D>(d: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match optional_string(d)?.as_deref() {
        None => Ok(None),
        Some("0") => Ok(Some(false)),
        Some("1") => Ok(Some(true)),
        Some(other) => Err(de::Error::custom(format!(
            "expected '0' or '1', found \"{}\"",
            other
        ))),
    }
}

/// Parse a `yyyy-mm-dd` date, mapping the null tokens to `None`.
pub fn optional_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = optional_string(d)? else {
        return Ok(None);
    };
    parse_date(&s).map(Some).map_err(de::Error::custom)
}

/// Like `optional_date`, but only looks at the first 10 characters so timestamps
/// (`yyyy-mm-ddThh:mm:ss`) are truncated to their date.
pub fn optional_date_prefix<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = optional_string(d)? else {
        return Ok(None);
    };
    let prefix = s.get(..10).unwrap_or(&s);
    parse_date(prefix).map(Some).map_err(de::Error::custom)
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("bad date \"{}\": {}", s, e))
}

/// Write `true` as '1' and `false` as '0'.
pub fn bool_01<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*v))
}

/// Like `bool_01`, with `None` as an empty field.
pub fn optional_bool_01<S: Serializer>(v: &Option<bool>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => bool_01(v, s),
        None => s.serialize_none(),
    }
}

/// Write a number with no fractional part as an integer (`64`, not `64.0`).
///
/// For numeric source columns passed through to the output, which are usually whole numbers.
pub fn whole_number<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    // 2^53: above this not every integer is representable
    const MAX_EXACT: f64 = 9_007_199_254_740_992.;
    if v.fract() == 0. && v.abs() <= MAX_EXACT {
        s.serialize_i64(*v as i64)
    } else {
        s.serialize_f64(*v)
    }
}

/// Like `whole_number`, with `None` as an empty field.
pub fn optional_whole_number<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => whole_number(v, s),
        None => s.serialize_none(),
    }
}

pub fn header(header: &str) {
    let len = header.len();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}

#[cfg(test)]
mod test {
    use super::{
        is_null_token, optional_date_prefix, optional_flag, optional_float,
        optional_whole_number, whole_number,
    };
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(deserialize_with = "optional_flag")]
        flag: Option<bool>,
        #[serde(deserialize_with = "optional_float")]
        value: Option<f64>,
        #[serde(deserialize_with = "optional_date_prefix")]
        taken: Option<NaiveDate>,
    }

    fn parse(input: &str) -> Result<Vec<Row>, csv::Error> {
        csv::Reader::from_reader(input.as_bytes())
            .into_deserialize()
            .collect()
    }

    #[test]
    fn null_tokens() {
        assert!(is_null_token(""));
        assert!(is_null_token(" "));
        assert!(is_null_token("NA"));
        assert!(!is_null_token("na"));
        assert!(!is_null_token("0"));
    }

    #[test]
    fn quirky_fields() {
        let rows = parse("flag,value,taken\n1,2.5,2010-05-01T09:12:00\nNA, ,\n0,NA,2011-01-02\n")
            .unwrap();
        assert_eq!(rows[0].flag, Some(true));
        assert_eq!(rows[0].value, Some(2.5));
        assert_eq!(rows[0].taken, NaiveDate::from_ymd_opt(2010, 5, 1));
        assert_eq!(rows[1].flag, None);
        assert_eq!(rows[1].value, None);
        assert_eq!(rows[1].taken, None);
        assert_eq!(rows[2].flag, Some(false));
        assert_eq!(rows[2].taken, NaiveDate::from_ymd_opt(2011, 1, 2));
    }

    #[test]
    fn bad_fields_are_errors() {
        assert!(parse("flag,value,taken\n2,1,\n").is_err());
        assert!(parse("flag,value,taken\n1,abc,\n").is_err());
        assert!(parse("flag,value,taken\n1,1,01/02/2010\n").is_err());
    }

    #[derive(Serialize)]
    struct Out {
        #[serde(serialize_with = "whole_number")]
        count: f64,
        #[serde(serialize_with = "optional_whole_number")]
        age: Option<f64>,
    }

    fn write(rows: &[Out]) -> String {
        let mut out = csv::Writer::from_writer(vec![]);
        for row in rows {
            out.serialize(row).unwrap();
        }
        String::from_utf8(out.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn whole_numbers_drop_the_fraction() {
        let text = write(&[
            Out {
                count: 280.,
                age: Some(64.),
            },
            Out {
                count: 280.5,
                age: None,
            },
            Out {
                count: -3.,
                age: Some(0.25),
            },
        ]);
        assert_eq!(text, "count,age\n280,64\n280.5,\n-3,0.25\n");
    }
}
