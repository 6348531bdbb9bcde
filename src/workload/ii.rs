//! A MapReduce-compatible inverted index.
//!
//! The output value for a word is the number of documents containing it
//! followed by the comma separated, sorted document names.

use crate::*;
use anyhow::Result;
use itertools::Itertools;

pub fn map(kv: KeyValue) -> MapOutput {
    let KeyValue { key: document, value } = kv;
    let words = value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .unique()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let iter = words
        .into_iter()
        .map(move |word| Ok(KeyValue::new(word, document.clone())));
    Ok(Box::new(iter))
}

pub fn reduce(_key: &str, values: Box<dyn Iterator<Item = String> + '_>) -> Result<String> {
    let documents = values.sorted().dedup().collect::<Vec<_>>();
    Ok(format!("{} {}", documents.len(), documents.join(",")))
}
