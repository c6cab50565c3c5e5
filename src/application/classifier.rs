use crate::domain::models::{Direction, RawTransaction, TransactionRecord};

/// Turns raw transaction details into transfer records for one tracked wallet.
///
/// Counterparty detection takes the first other account whose balance moved the
/// opposite way. Multi-party transactions (a separate fee payer, several
/// recipients) can make that guess wrong, so the counterparty is best effort.
#[derive(Clone, Debug)]
pub struct TransactionClassifier {
    address: String,
}

impl TransactionClassifier {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Returns `None` for failed transactions and for details without balance data.
    pub fn classify(&self, signature: &str, raw: &RawTransaction) -> Option<TransactionRecord> {
        let meta = raw.meta.as_ref()?;
        if let Some(err) = &meta.err {
            tracing::debug!("Dropping failed transaction {}: {}", signature, err);
            return None;
        }
        if meta.pre_balances.is_empty() || meta.post_balances.is_empty() {
            return None;
        }

        let Some(index) = raw.account_keys.iter().position(|k| *k == self.address) else {
            return Some(TransactionRecord::unknown(signature, raw.block_time, raw.slot));
        };
        let pre = *meta.pre_balances.get(index)?;
        let post = *meta.post_balances.get(index)?;

        let (direction, lamports) = match post.cmp(&pre) {
            std::cmp::Ordering::Greater => (Direction::Received, post - pre),
            std::cmp::Ordering::Less => (Direction::Sent, pre - post),
            std::cmp::Ordering::Equal => {
                return Some(TransactionRecord::unknown(signature, raw.block_time, raw.slot))
            }
        };

        let counterparty = meta
            .pre_balances
            .iter()
            .zip(meta.post_balances.iter())
            .enumerate()
            .filter(|(i, _)| *i != index)
            .find(|(_, (other_pre, other_post))| match direction {
                Direction::Received => other_post < other_pre,
                _ => other_post > other_pre,
            })
            .and_then(|(i, _)| raw.account_keys.get(i).cloned());

        Some(TransactionRecord::new(
            signature,
            raw.block_time,
            raw.slot,
            direction,
            lamports,
            counterparty,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RawMeta;

    const WALLET: &str = "wallet";

    fn raw(keys: &[&str], pre: &[u64], post: &[u64]) -> RawTransaction {
        RawTransaction {
            slot: 42,
            block_time: Some(1_700_000_000),
            account_keys: keys.iter().map(|k| k.to_string()).collect(),
            meta: Some(RawMeta {
                err: None,
                pre_balances: pre.to_vec(),
                post_balances: post.to_vec(),
            }),
        }
    }

    #[test]
    fn outgoing_transfer_names_receiver() {
        let classifier = TransactionClassifier::new(WALLET);
        let tx = raw(
            &[WALLET, "receiver", "program"],
            &[2_000_000_000, 0, 1],
            &[1_750_000_000, 250_000_000, 1],
        );

        let record = classifier.classify("sig", &tx).unwrap();
        assert_eq!(record.direction, Direction::Sent);
        assert_eq!(record.lamports, 250_000_000);
        assert_eq!(record.amount, 0.25);
        assert_eq!(record.counterparty.as_deref(), Some("receiver"));
        assert_eq!(record.slot, 42);
    }

    #[test]
    fn incoming_transfer_names_first_payer() {
        let classifier = TransactionClassifier::new(WALLET);
        let tx = raw(
            &["fee-payer", "sender", WALLET],
            &[10, 3_000_000_000, 0],
            &[5, 2_000_000_000, 1_000_000_000],
        );

        let record = classifier.classify("sig", &tx).unwrap();
        assert_eq!(record.direction, Direction::Received);
        assert_eq!(record.amount, 1.0);
        // first decreasing account wins, even when it only paid the fee
        assert_eq!(record.counterparty.as_deref(), Some("fee-payer"));
    }

    #[test]
    fn absent_wallet_is_unknown() {
        let classifier = TransactionClassifier::new(WALLET);
        let tx = raw(&["a", "b"], &[10, 0], &[0, 10]);

        let record = classifier.classify("sig", &tx).unwrap();
        assert_eq!(record.direction, Direction::Unknown);
        assert_eq!(record.lamports, 0);
        assert_eq!(record.counterparty, None);
    }

    #[test]
    fn unchanged_balance_is_unknown() {
        let classifier = TransactionClassifier::new(WALLET);
        let tx = raw(&[WALLET, "b"], &[10, 5], &[10, 5]);

        let record = classifier.classify("sig", &tx).unwrap();
        assert_eq!(record.direction, Direction::Unknown);
        assert_eq!(record.amount, 0.0);
    }

    #[test]
    fn failed_transaction_is_dropped() {
        let classifier = TransactionClassifier::new(WALLET);
        let mut tx = raw(&[WALLET, "b"], &[10, 0], &[0, 10]);
        if let Some(meta) = tx.meta.as_mut() {
            meta.err = Some("InstructionError".to_string());
        }

        assert!(classifier.classify("sig", &tx).is_none());
    }

    #[test]
    fn missing_balance_data_is_dropped() {
        let classifier = TransactionClassifier::new(WALLET);
        let mut tx = raw(&[WALLET], &[], &[]);
        assert!(classifier.classify("sig", &tx).is_none());

        tx.meta = None;
        assert!(classifier.classify("sig", &tx).is_none());

        let short = raw(&["a", WALLET], &[1], &[1]);
        assert!(classifier.classify("sig", &short).is_none());
    }
}
