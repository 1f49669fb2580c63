//! Admission mempool: the challenge/ticket state machine gating appends
//!
//! One table keyed by address holds each entry's state tag and absolute
//! expiry instant. There are no per-entry timers: every access treats
//! `now >= expires_at` as expired and drops the entry on the spot, so a
//! displayed window can never disagree with actual deletion. A periodic
//! [`Mempool::sweep`] only reclaims memory; correctness never depends on it.

use crate::block::unix_time;
use crate::crypto;
use crate::error::{NotaryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Seconds a challenge stays open for signing.
pub const CHALLENGE_WINDOW_SECS: u64 = 300;
/// Seconds a verified ticket stays valid for registering a star.
pub const TICKET_WINDOW_SECS: u64 = 1800;

const MESSAGE_TAG: &str = "starRegistry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdmissionState {
    Pending,
    Valid,
}

#[derive(Debug, Clone)]
struct AdmissionEntry {
    state: AdmissionState,
    request_timestamp: u64,
    message: String,
    expires_at: u64,
}

/// A time-bounded challenge an address must sign to prove key ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub wallet_address: String,
    pub request_time_stamp: String,
    pub message: String,
    pub validation_window: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatus {
    pub address: String,
    pub request_time_stamp: String,
    pub message: String,
    pub validation_window: u64,
    pub message_signature: bool,
}

/// Proof of a verified signature, authorizing one ledger append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionTicket {
    pub register_star: bool,
    pub status: TicketStatus,
}

pub struct Mempool {
    entries: Mutex<HashMap<String, AdmissionEntry>>,
    challenge_window: u64,
    ticket_window: u64,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self::with_windows(CHALLENGE_WINDOW_SECS, TICKET_WINDOW_SECS)
    }

    /// Custom expiry windows, in seconds. Tests use zero-length windows to
    /// exercise expiry without sleeping.
    pub fn with_windows(challenge_window: u64, ticket_window: u64) -> Self {
        Mempool {
            entries: Mutex::new(HashMap::new()),
            challenge_window,
            ticket_window,
        }
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<String, AdmissionEntry>>> {
        self.entries
            .lock()
            .map_err(|_| NotaryError::IoError("mempool lock poisoned".to_string()))
    }

    /// Drop the entry for `address` if its expiry has passed.
    fn expire_if_stale(
        table: &mut HashMap<String, AdmissionEntry>,
        address: &str,
        now: u64,
    ) {
        if let Some(entry) = table.get(address) {
            if now >= entry.expires_at {
                table.remove(address);
            }
        }
    }

    /// Return the open challenge for `address`, creating one if none exists.
    /// Re-querying an open challenge is idempotent: the message is unchanged
    /// and the remaining window is recomputed, never reset.
    pub fn request_challenge(&self, address: &str) -> Result<ValidationRequest> {
        let now = unix_time();
        let mut table = self.table()?;
        Self::expire_if_stale(&mut table, address, now);

        if let Some(entry) = table.get(address) {
            if entry.state == AdmissionState::Pending {
                return Ok(ValidationRequest {
                    wallet_address: address.to_string(),
                    request_time_stamp: entry.request_timestamp.to_string(),
                    message: entry.message.clone(),
                    validation_window: entry.expires_at - now,
                });
            }
        }

        let message = format!("{}:{}:{}", address, now, MESSAGE_TAG);
        table.insert(
            address.to_string(),
            AdmissionEntry {
                state: AdmissionState::Pending,
                request_timestamp: now,
                message: message.clone(),
                expires_at: now + self.challenge_window,
            },
        );
        tracing::debug!(address, "validation request created");

        Ok(ValidationRequest {
            wallet_address: address.to_string(),
            request_time_stamp: now.to_string(),
            message,
            validation_window: self.challenge_window,
        })
    }

    /// Verify `signature` against the address's challenge or ticket.
    ///
    /// A valid ticket is re-verified and returned with a refreshed window; a
    /// failed re-signature is rejected without revoking the ticket. A
    /// pending challenge is promoted to a ticket on success and left
    /// untouched on failure.
    pub fn verify_ownership(&self, address: &str, signature: &str) -> Result<AdmissionTicket> {
        let now = unix_time();
        let mut table = self.table()?;
        Self::expire_if_stale(&mut table, address, now);

        let entry = table
            .get_mut(address)
            .ok_or(NotaryError::ValidationNotFound)?;

        if !crypto::verify_address_signature(address, &entry.message, signature) {
            return Err(NotaryError::InvalidSignature);
        }

        if entry.state == AdmissionState::Pending {
            entry.state = AdmissionState::Valid;
            entry.request_timestamp = now;
            entry.expires_at = now + self.ticket_window;
            tracing::debug!(address, "validation request promoted to ticket");
        }

        Ok(AdmissionTicket {
            register_star: true,
            status: TicketStatus {
                address: address.to_string(),
                request_time_stamp: entry.request_timestamp.to_string(),
                message: entry.message.clone(),
                validation_window: entry.expires_at - now,
                message_signature: true,
            },
        })
    }

    /// True iff a non-expired ticket currently exists for `address`.
    pub fn is_admitted(&self, address: &str) -> Result<bool> {
        let now = unix_time();
        let mut table = self.table()?;
        Self::expire_if_stale(&mut table, address, now);

        Ok(table
            .get(address)
            .map(|entry| entry.state == AdmissionState::Valid)
            .unwrap_or(false))
    }

    /// Unconditionally remove the address's challenge and ticket. Invoked
    /// exactly once per successful block admission.
    pub fn consume(&self, address: &str) -> Result<()> {
        self.table()?.remove(address);
        Ok(())
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep(&self) -> Result<usize> {
        let now = unix_time();
        let mut table = self.table()?;
        let before = table.len();
        table.retain(|_, entry| now < entry.expires_at);
        Ok(before - table.len())
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.lock().map(|t| t.len()).unwrap_or(0)
    }
}
