//! A MapReduce-compatible implementation of word count.
//!
//! Each map call emits one pair per distinct word with the number of times
//! it occurs in the document; reduce sums those per-document counts.

use crate::*;
use anyhow::{Context, Result};
use itertools::Itertools;

pub fn map(kv: KeyValue) -> MapOutput {
    let counts = kv.value.split_whitespace().counts();

    let pairs = counts
        .into_iter()
        .map(|(word, count)| KeyValue::new(word, count.to_string()))
        .collect::<Vec<_>>();
    Ok(Box::new(pairs.into_iter().map(Ok)))
}

pub fn reduce(key: &str, values: Box<dyn Iterator<Item = String> + '_>) -> Result<String> {
    let mut count = 0u64;
    for value in values {
        count += value
            .parse::<u64>()
            .with_context(|| format!("bad count {value:?} for {key:?}"))?;
    }
    Ok(count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_counts_within_a_document() {
        let out = map(KeyValue::new("doc", "a b  a\nc a"))
            .unwrap()
            .map(|kv| kv.unwrap())
            .sorted_by(|x, y| x.key.cmp(&y.key))
            .collect::<Vec<_>>();
        assert_eq!(
            out,
            vec![
                KeyValue::new("a", "3"),
                KeyValue::new("b", "1"),
                KeyValue::new("c", "1"),
            ]
        );
    }

    #[test]
    fn reduce_sums_and_rejects_garbage() {
        let values = vec!["2".to_string(), "5".to_string()];
        assert_eq!(reduce("a", Box::new(values.into_iter())).unwrap(), "7");

        let values = vec!["x".to_string()];
        assert!(reduce("a", Box::new(values.into_iter())).is_err());
    }
}
