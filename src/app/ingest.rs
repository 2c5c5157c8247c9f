//! Classification and upsert of a single explorer transaction.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AppError, Blockchain, Campaign, DOGE_CURRENCY_SYMBOL, Donation, DonationFilter,
    DonationRepository, NameResolver, NewDonation, Transaction, attributed_sender,
    donation_amount, is_donation,
};

/// Turns transactions into donation rows for one monitored address
#[derive(Clone)]
pub struct DonationIngestor {
    repository: Arc<dyn DonationRepository>,
    names: Arc<dyn NameResolver>,
    monitored_address: String,
}

impl DonationIngestor {
    #[must_use]
    pub fn new(
        repository: Arc<dyn DonationRepository>,
        names: Arc<dyn NameResolver>,
        monitored_address: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            names,
            monitored_address: monitored_address.into(),
        }
    }

    #[must_use]
    pub fn monitored_address(&self) -> &str {
        &self.monitored_address
    }

    /// Record `tx` if it is a donation and return the stored row.
    ///
    /// Returns `Ok(None)` without touching the store when `tx` is not a donation.
    /// Re-ingesting the same hash updates the existing row.
    #[instrument(skip(self, tx), fields(tx_hash = %tx.hash, block_height = ?tx.block_height))]
    pub async fn upsert_transaction(&self, tx: &Transaction) -> Result<Option<Donation>, AppError> {
        if !is_donation(tx, &self.monitored_address) {
            debug!("Transaction is not a donation, skipping");
            return Ok(None);
        }

        let from_address = attributed_sender(tx).unwrap_or_default().to_string();
        if from_address.is_empty() {
            warn!("Donation has no attributable sender");
        }

        let new_donation = NewDonation {
            tx_hash: tx.hash.clone(),
            amount: donation_amount(tx, &self.monitored_address),
            from_address,
            to_address: self.monitored_address.clone(),
            blockchain: Blockchain::Dogecoin,
            campaign: Campaign::Ph,
            currency: DOGE_CURRENCY_SYMBOL.to_string(),
            block_created_at: tx.received,
            block_number: tx.block_height,
        };

        let id = self.repository.upsert(&new_donation).await?;
        info!(id = id, amount = %new_donation.amount, "Donation recorded");

        if let Err(e) = self
            .names
            .refresh_cached_name(&new_donation.from_address)
            .await
        {
            warn!(address = %new_donation.from_address, error = %e, "Failed to refresh donor name");
        }

        let donation = self
            .repository
            .find_first_or_throw(&DonationFilter::by_id(id))
            .await?;
        Ok(Some(donation))
    }
}
