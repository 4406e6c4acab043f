//! Error taxonomy for the paytill ledger
//!
//! Balance-check and state-transition failures are business outcomes and are
//! reported distinctly from storage/infrastructure errors so calling layers
//! can decline vs. retry. Every failing operation leaves the store unchanged.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for paytill operations
pub type Result<T> = std::result::Result<T, PaytillError>;

/// Paytill error types
#[derive(Debug, Clone, Error)]
pub enum PaytillError {
    // ========================================================================
    // Amount Errors
    // ========================================================================

    /// Amount must be strictly positive
    #[error("Invalid amount {amount}: must be greater than zero")]
    InvalidAmount { amount: Decimal },

    // ========================================================================
    // Balance Errors
    // ========================================================================

    /// Spendable balance cannot cover the request
    #[error("Insufficient balance in wallet {wallet}: requested {requested}, available {available}")]
    InsufficientBalance {
        wallet: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Spendable balance cannot cover a pending debit hold
    #[error("Insufficient available balance in wallet {wallet}: requested {requested}, available {available}")]
    InsufficientAvailableBalance {
        wallet: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Locked balance cannot cover the release
    #[error("Insufficient locked balance in wallet {wallet}: requested {requested}, locked {locked}")]
    InsufficientLockedBalance {
        wallet: String,
        requested: Decimal,
        locked: Decimal,
    },

    // ========================================================================
    // Wallet Errors
    // ========================================================================

    /// Wallet not found
    #[error("Wallet {wallet} not found")]
    WalletNotFound { wallet: String },

    /// Transfer source and destination are the same wallet
    #[error("Cannot transfer wallet {wallet} to itself")]
    SameWallet { wallet: String },

    // ========================================================================
    // Transaction Errors
    // ========================================================================

    /// Transaction not found
    #[error("Transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    /// Operation requires a PENDING transaction
    #[error("Transaction {transaction_id} is not pending (status: {status})")]
    TransactionNotPending {
        transaction_id: String,
        status: String,
    },

    /// Operation requires a COMPLETED transaction
    #[error("Transaction {transaction_id} is not completed (status: {status})")]
    TransactionNotCompleted {
        transaction_id: String,
        status: String,
    },

    /// Transaction has already been reversed
    #[error("Transaction {transaction_id} has already been reversed")]
    AlreadyReversed { transaction_id: String },

    // ========================================================================
    // Settlement Errors
    // ========================================================================

    /// Settlement not found
    #[error("Settlement {settlement_id} not found")]
    SettlementNotFound { settlement_id: String },

    /// Operation requires a PENDING settlement
    #[error("Settlement {settlement_id} is not pending (status: {status})")]
    SettlementNotPending {
        settlement_id: String,
        status: String,
    },

    /// Unrecognized settlement frequency value
    #[error("Invalid settlement frequency: {value}")]
    InvalidFrequency { value: String },

    /// Manual settlement requested without a MANUAL schedule
    #[error("Manual settlement not configured for owner {owner}")]
    ManualNotConfigured { owner: String },

    // ========================================================================
    // Storage Errors
    // ========================================================================

    /// Concurrent-write contention detected by the backing store
    #[error("Storage conflict: {message}")]
    StorageConflict { message: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PaytillError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a storage conflict error
    pub fn storage_conflict(message: impl Into<String>) -> Self {
        Self::StorageConflict {
            message: message.into(),
        }
    }

    /// Check if this error is safe to retry
    ///
    /// Only [`PaytillError::StorageConflict`] qualifies: no effect was
    /// committed and the contention may have cleared. Everything else is a
    /// final business outcome.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StorageConflict { .. })
    }

    /// Get a stable error code for API responses and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InsufficientAvailableBalance { .. } => "INSUFFICIENT_AVAILABLE_BALANCE",
            Self::InsufficientLockedBalance { .. } => "INSUFFICIENT_LOCKED_BALANCE",
            Self::WalletNotFound { .. } => "WALLET_NOT_FOUND",
            Self::SameWallet { .. } => "SAME_WALLET",
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::TransactionNotPending { .. } => "TRANSACTION_NOT_PENDING",
            Self::TransactionNotCompleted { .. } => "TRANSACTION_NOT_COMPLETED",
            Self::AlreadyReversed { .. } => "ALREADY_REVERSED",
            Self::SettlementNotFound { .. } => "SETTLEMENT_NOT_FOUND",
            Self::SettlementNotPending { .. } => "SETTLEMENT_NOT_PENDING",
            Self::InvalidFrequency { .. } => "INVALID_FREQUENCY",
            Self::ManualNotConfigured { .. } => "MANUAL_NOT_CONFIGURED",
            Self::StorageConflict { .. } => "STORAGE_CONFLICT",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
