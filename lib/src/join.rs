//! One-to-one joins between tables keyed by patient.
//!
//! Both sides are checked for duplicate keys before joining. A duplicate means a table doesn't
//! have the shape we think it has, and joining anyway would silently multiply rows.
use crate::error::PipelineError;
use std::{collections::BTreeMap, fmt};

/// Map each key to its row index, failing if any key appears twice.
pub fn unique_index<T, K>(
    table: &'static str,
    rows: &[T],
    key: impl Fn(&T) -> K,
) -> Result<BTreeMap<K, usize>, PipelineError>
where
    K: Ord + fmt::Display,
{
    let mut idx = BTreeMap::new();
    for (pos, row) in rows.iter().enumerate() {
        let k = key(row);
        if idx.contains_key(&k) {
            return Err(PipelineError::DuplicateKey {
                table,
                key: k.to_string(),
            });
        }
        idx.insert(k, pos);
    }
    Ok(idx)
}

/// A named table with a key function, for passing to the join functions.
pub struct Keyed<'a, T, F> {
    pub name: &'static str,
    pub rows: &'a [T],
    pub key: F,
}

impl<'a, T, F> Keyed<'a, T, F> {
    pub fn new<K>(name: &'static str, rows: &'a [T], key: F) -> Self
    where
        F: Fn(&T) -> K,
    {
        Self { name, rows, key }
    }
}

/// Every left row, paired with the matching right row if there is one. Left order is kept.
pub fn left_join_one_to_one<'a, L, R, K, FL, FR>(
    left: Keyed<'a, L, FL>,
    right: Keyed<'a, R, FR>,
) -> Result<Vec<(&'a L, Option<&'a R>)>, PipelineError>
where
    K: Ord + fmt::Display,
    FL: Fn(&L) -> K,
    FR: Fn(&R) -> K,
{
    unique_index(left.name, left.rows, &left.key)?;
    let right_idx = unique_index(right.name, right.rows, &right.key)?;
    Ok(left
        .rows
        .iter()
        .map(|l| {
            let r = right_idx
                .get(&(left.key)(l))
                .map(|idx| &right.rows[*idx]);
            (l, r)
        })
        .collect())
}

/// Left rows that have a matching right row. Left order is kept.
pub fn inner_join_one_to_one<'a, L, R, K, FL, FR>(
    left: Keyed<'a, L, FL>,
    right: Keyed<'a, R, FR>,
) -> Result<Vec<(&'a L, &'a R)>, PipelineError>
where
    K: Ord + fmt::Display,
    FL: Fn(&L) -> K,
    FR: Fn(&R) -> K,
{
    Ok(left_join_one_to_one(left, right)?
        .into_iter()
        .filter_map(|(l, r)| Some((l, r?)))
        .collect())
}
