//! Mint batching.
//!
//! Unminted records are grouped per destination recipient (in order of
//! first appearance) and each group is cut into fixed-size batches plus a
//! trailing remainder batch. Token order within a recipient is preserved.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::record::MigrationRecord;

/// All pending destination token ids for one recipient on one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientGroup {
    pub recipient: String,
    pub contract_address: String,
    pub token_ids: Vec<u64>,
}

/// One mint submission: a recipient and up to `batch_size` token ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintBatch {
    pub recipient: String,
    pub contract_address: String,
    pub token_ids: Vec<u64>,
}

impl MintBatch {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Compact `first..last` description for logs.
    pub fn token_range(&self) -> String {
        match (self.token_ids.first(), self.token_ids.last()) {
            (Some(first), Some(last)) if first == last => first.to_string(),
            (Some(first), Some(last)) => format!("{}..{}", first, last),
            _ => String::from("-"),
        }
    }
}

/// Group unminted records by (recipient, destination collection).
///
/// Already minted records are ignored. Groups come out in the order their
/// recipient was first encountered.
pub fn group_by_recipient(records: &[MigrationRecord]) -> Vec<RecipientGroup> {
    let mut groups: Vec<RecipientGroup> = Vec::new();

    for record in records.iter().filter(|r| !r.minted) {
        let existing = groups.iter_mut().find(|g| {
            g.recipient == record.to_destination_wallet
                && g.contract_address == record.destination_token_address
        });

        match existing {
            Some(group) => group.token_ids.push(record.destination_token_id),
            None => groups.push(RecipientGroup {
                recipient: record.to_destination_wallet.clone(),
                contract_address: record.destination_token_address.clone(),
                token_ids: vec![record.destination_token_id],
            }),
        }
    }

    groups
}

/// Cut one recipient group into batches of exactly `batch_size` plus a remainder.
///
/// A remainder of zero produces no extra batch.
pub fn split_group(group: &RecipientGroup, batch_size: usize) -> Result<Vec<MintBatch>, CoreError> {
    if batch_size == 0 {
        return Err(CoreError::ZeroBatchSize);
    }

    Ok(group
        .token_ids
        .chunks(batch_size)
        .map(|chunk| MintBatch {
            recipient: group.recipient.clone(),
            contract_address: group.contract_address.clone(),
            token_ids: chunk.to_vec(),
        })
        .collect())
}

/// Group and split in one step.
pub fn build_batches(
    records: &[MigrationRecord],
    batch_size: usize,
) -> Result<Vec<MintBatch>, CoreError> {
    let mut batches = Vec::new();
    for group in group_by_recipient(records) {
        batches.extend(split_group(&group, batch_size)?);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const COLLECTION: &str = "0x82633202e463d7a39e6c03a843f0f4e83b7e9aa3";

    fn record(id: i64, token_id: u64, recipient: &str, minted: bool) -> MigrationRecord {
        MigrationRecord {
            id,
            destination_token_id: token_id,
            burned: true,
            origin_chain_id: 137,
            origin_block_number: Some(1),
            burn_timestamp: Utc::now(),
            burn_transaction_hash: Some("0x01".to_string()),
            burn_transaction_id: None,
            origin_token_address: "0x0551b1c0b01928ab22a565b58427ff0176de883c".to_string(),
            origin_token_id: token_id,
            from_origin_wallet: recipient.to_string(),
            to_origin_wallet: crate::NULL_ADDRESS.to_string(),
            minted,
            destination_chain_id: 5001,
            destination_token_address: COLLECTION.to_string(),
            to_destination_wallet: recipient.to_string(),
            mint_transaction_hash: None,
            mint_transaction_id: None,
        }
    }

    #[test]
    fn test_450_tokens_batch_200() {
        let records: Vec<_> = (0..450).map(|i| record(i, i as u64, ALICE, false)).collect();
        let batches = build_batches(&records, 200).unwrap();

        let sizes: Vec<_> = batches.iter().map(MintBatch::len).collect();
        assert_eq!(sizes, vec![200, 200, 50]);

        let flattened: Vec<u64> = batches.iter().flat_map(|b| b.token_ids.clone()).collect();
        assert_eq!(flattened, (0..450).collect::<Vec<u64>>());
    }

    #[test]
    fn test_exact_multiple_has_no_empty_remainder() {
        let records: Vec<_> = (0..400).map(|i| record(i, i as u64, ALICE, false)).collect();
        let batches = build_batches(&records, 200).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn test_batch_count_is_ceiling() {
        for n in 1..=25u64 {
            for b in 1..=7usize {
                let records: Vec<_> = (0..n).map(|i| record(i as i64, i, ALICE, false)).collect();
                let batches = build_batches(&records, b).unwrap();
                let expected = (n as usize + b - 1) / b;
                assert_eq!(batches.len(), expected, "n={} b={}", n, b);
                assert!(batches.iter().all(|batch| batch.len() <= b));
            }
        }
    }

    #[test]
    fn test_recipient_order_and_minted_skipped() {
        let records = vec![
            record(1, 10, BOB, false),
            record(2, 11, ALICE, false),
            record(3, 12, BOB, true),
            record(4, 13, BOB, false),
        ];
        let groups = group_by_recipient(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].recipient, BOB);
        assert_eq!(groups[0].token_ids, vec![10, 13]);
        assert_eq!(groups[1].recipient, ALICE);
        assert_eq!(groups[1].token_ids, vec![11]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let records = vec![record(1, 1, ALICE, false)];
        assert_eq!(build_batches(&records, 0), Err(CoreError::ZeroBatchSize));
    }

    #[test]
    fn test_token_range_display() {
        let batch = MintBatch {
            recipient: ALICE.to_string(),
            contract_address: COLLECTION.to_string(),
            token_ids: vec![5, 6, 9],
        };
        assert_eq!(batch.token_range(), "5..9");
    }
}
