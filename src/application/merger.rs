use crate::domain::models::TransactionRecord;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Transaction records unique by signature, kept newest first.
///
/// Order is `block_time` descending with `slot` descending as tie-break; records
/// without a block time sort last.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<TransactionRecord>,
    // signature -> position in `records`
    index: HashMap<String, usize>,
}

impl RecordSet {
    /// Builds a set from previously stored records, dropping duplicate signatures.
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let mut set = Self::default();
        set.merge(records);
        set
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// The `limit` most recent records.
    pub fn recent(&self, limit: usize) -> &[TransactionRecord] {
        &self.records[..limit.min(self.records.len())]
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.index.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Upserts `incoming` by signature and returns how many signatures were new.
    ///
    /// A known signature is replaced in place. Merging the same batch twice adds
    /// nothing the second time and leaves the order unchanged.
    pub fn merge(&mut self, incoming: Vec<TransactionRecord>) -> usize {
        if incoming.is_empty() {
            return 0;
        }

        let mut added = 0;
        for record in incoming {
            match self.index.get(&record.signature) {
                Some(&position) => self.records[position] = record,
                None => {
                    self.index
                        .insert(record.signature.clone(), self.records.len());
                    self.records.push(record);
                    added += 1;
                }
            }
        }

        // stable, so equal keys keep their relative order across merges
        self.records
            .sort_by_key(|r| Reverse((r.block_time, r.slot)));
        self.reindex();
        added
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, record) in self.records.iter().enumerate() {
            self.index.insert(record.signature.clone(), position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Direction;
    use std::collections::HashSet;

    fn record(signature: &str, block_time: i64, lamports: u64) -> TransactionRecord {
        TransactionRecord::new(
            signature,
            Some(block_time),
            block_time as u64,
            Direction::Received,
            lamports,
            None,
        )
    }

    fn signatures(records: &[TransactionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.signature.as_str()).collect()
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![record("a", 1, 1), record("c", 3, 1), record("b", 2, 1)];

        let mut set = RecordSet::default();
        assert_eq!(set.merge(batch.clone()), 3);
        let once = set.clone();

        assert_eq!(set.merge(batch), 0);
        assert_eq!(set, once);
        assert_eq!(signatures(set.records()), vec!["c", "b", "a"]);
    }

    #[test]
    fn keeps_signatures_unique_and_sorted() {
        let mut set = RecordSet::from_records(vec![record("a", 10, 1), record("b", 20, 1)]);
        let added = set.merge(vec![record("c", 15, 1), record("a", 10, 1), record("c", 15, 2)]);

        assert_eq!(added, 1);
        assert_eq!(signatures(set.records()), vec!["b", "c", "a"]);
        let unique: HashSet<_> = set.records().iter().map(|r| &r.signature).collect();
        assert_eq!(unique.len(), set.len());
        // later duplicate in the same batch wins
        assert_eq!(set.records()[1].lamports, 2);
    }

    #[test]
    fn replacement_refreshes_fields_in_place() {
        let mut set = RecordSet::from_records(vec![record("a", 10, 1), record("b", 20, 1)]);
        let added = set.merge(vec![record("a", 10, 7)]);

        assert_eq!(added, 0);
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[1].lamports, 7);
    }

    #[test]
    fn slot_breaks_block_time_ties_and_missing_time_sorts_last() {
        let mut undated = record("undated", 0, 1);
        undated.block_time = None;
        let mut early_slot = record("early", 50, 1);
        early_slot.slot = 1;
        let mut late_slot = record("late", 50, 1);
        late_slot.slot = 9;

        let set = RecordSet::from_records(vec![undated, early_slot, late_slot]);
        assert_eq!(signatures(set.records()), vec!["late", "early", "undated"]);
    }

    #[test]
    fn recent_is_bounded() {
        let set = RecordSet::from_records(vec![record("a", 1, 1), record("b", 2, 1)]);
        assert_eq!(signatures(set.recent(1)), vec!["b"]);
        assert_eq!(set.recent(10).len(), 2);
        assert!(set.contains("a"));
        assert!(!set.contains("z"));
    }
}
