use std::fmt;

use alloy::primitives::{Address, B256, LogData, U256};
use alloy::sol_types::SolEvent;

use crate::model::vault::VaultStatus;

// ── Solidity ABI ────────────────────────────────────────────────────

mod abi {
    use alloy::sol;

    sol! {
        #[allow(missing_docs)]
        event Deposit(address indexed sender, address indexed owner, uint256 assets, uint256 shares);
        #[allow(missing_docs)]
        event Withdraw(address indexed sender, address indexed receiver, address indexed owner, uint256 assets, uint256 shares);
        #[allow(missing_docs)]
        event Transfer(address indexed from, address indexed to, uint256 value);
        #[allow(missing_docs)]
        event Approval(address indexed owner, address indexed spender, uint256 value);
        #[allow(missing_docs)]
        event SettlementShortfallUpdated(uint256 oldShortfall, uint256 newShortfall);
        #[allow(missing_docs)]
        event SettlementRatioUpdated(uint256 oldRatio, uint256 newRatio);
        #[allow(missing_docs)]
        event RouterWithdrawSettled(address indexed vault, uint256 grossAssets, uint256 netAssets);
        #[allow(missing_docs)]
        event VaultConfigured(address indexed vault, uint32 targetBps, uint8 status);
        #[allow(missing_docs)]
        event DefaultVaultUpdated(address indexed oldVault, address indexed newVault);
        #[allow(missing_docs)]
        event WithdrawalFeeUpdated(uint32 oldFeeBps, uint32 newFeeBps);
    }
}

// ── Emitted events ──────────────────────────────────────────────────

/// A record appended to the token's event log by a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Deposit {
        sender: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    Withdraw {
        sender: Address,
        receiver: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
    SettlementShortfallUpdated {
        old: U256,
        new: U256,
    },
    SettlementRatioUpdated {
        old: U256,
        new: U256,
    },
    RouterWithdrawSettled {
        vault: Address,
        gross_assets: U256,
        net_assets: U256,
    },
    VaultConfigured {
        vault: Address,
        target_bps: u32,
        status: VaultStatus,
    },
    DefaultVaultUpdated {
        old: Option<Address>,
        new: Address,
    },
    WithdrawalFeeUpdated {
        old_bps: u32,
        new_bps: u32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Deposit { .. } => "Deposit",
            Event::Withdraw { .. } => "Withdraw",
            Event::Transfer { .. } => "Transfer",
            Event::Approval { .. } => "Approval",
            Event::SettlementShortfallUpdated { .. } => "SettlementShortfallUpdated",
            Event::SettlementRatioUpdated { .. } => "SettlementRatioUpdated",
            Event::RouterWithdrawSettled { .. } => "RouterWithdrawSettled",
            Event::VaultConfigured { .. } => "VaultConfigured",
            Event::DefaultVaultUpdated { .. } => "DefaultVaultUpdated",
            Event::WithdrawalFeeUpdated { .. } => "WithdrawalFeeUpdated",
        }
    }

    /// Canonical Solidity signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> &'static str {
        match self {
            Event::Deposit { .. } => abi::Deposit::SIGNATURE,
            Event::Withdraw { .. } => abi::Withdraw::SIGNATURE,
            Event::Transfer { .. } => abi::Transfer::SIGNATURE,
            Event::Approval { .. } => abi::Approval::SIGNATURE,
            Event::SettlementShortfallUpdated { .. } => abi::SettlementShortfallUpdated::SIGNATURE,
            Event::SettlementRatioUpdated { .. } => abi::SettlementRatioUpdated::SIGNATURE,
            Event::RouterWithdrawSettled { .. } => abi::RouterWithdrawSettled::SIGNATURE,
            Event::VaultConfigured { .. } => abi::VaultConfigured::SIGNATURE,
            Event::DefaultVaultUpdated { .. } => abi::DefaultVaultUpdated::SIGNATURE,
            Event::WithdrawalFeeUpdated { .. } => abi::WithdrawalFeeUpdated::SIGNATURE,
        }
    }

    /// Topic 0 of the encoded log.
    pub fn topic0(&self) -> B256 {
        match self {
            Event::Deposit { .. } => abi::Deposit::SIGNATURE_HASH,
            Event::Withdraw { .. } => abi::Withdraw::SIGNATURE_HASH,
            Event::Transfer { .. } => abi::Transfer::SIGNATURE_HASH,
            Event::Approval { .. } => abi::Approval::SIGNATURE_HASH,
            Event::SettlementShortfallUpdated { .. } => abi::SettlementShortfallUpdated::SIGNATURE_HASH,
            Event::SettlementRatioUpdated { .. } => abi::SettlementRatioUpdated::SIGNATURE_HASH,
            Event::RouterWithdrawSettled { .. } => abi::RouterWithdrawSettled::SIGNATURE_HASH,
            Event::VaultConfigured { .. } => abi::VaultConfigured::SIGNATURE_HASH,
            Event::DefaultVaultUpdated { .. } => abi::DefaultVaultUpdated::SIGNATURE_HASH,
            Event::WithdrawalFeeUpdated { .. } => abi::WithdrawalFeeUpdated::SIGNATURE_HASH,
        }
    }

    /// EVM log topics and data for this event.
    pub fn encode_log(&self) -> LogData {
        match *self {
            Event::Deposit {
                sender,
                owner,
                assets,
                shares,
            } => abi::Deposit {
                sender,
                owner,
                assets,
                shares,
            }
            .encode_log_data(),
            Event::Withdraw {
                sender,
                receiver,
                owner,
                assets,
                shares,
            } => abi::Withdraw {
                sender,
                receiver,
                owner,
                assets,
                shares,
            }
            .encode_log_data(),
            Event::Transfer { from, to, value } => abi::Transfer { from, to, value }.encode_log_data(),
            Event::Approval {
                owner,
                spender,
                value,
            } => abi::Approval {
                owner,
                spender,
                value,
            }
            .encode_log_data(),
            Event::SettlementShortfallUpdated { old, new } => abi::SettlementShortfallUpdated {
                oldShortfall: old,
                newShortfall: new,
            }
            .encode_log_data(),
            Event::SettlementRatioUpdated { old, new } => abi::SettlementRatioUpdated {
                oldRatio: old,
                newRatio: new,
            }
            .encode_log_data(),
            Event::RouterWithdrawSettled {
                vault,
                gross_assets,
                net_assets,
            } => abi::RouterWithdrawSettled {
                vault,
                grossAssets: gross_assets,
                netAssets: net_assets,
            }
            .encode_log_data(),
            Event::VaultConfigured {
                vault,
                target_bps,
                status,
            } => abi::VaultConfigured {
                vault,
                targetBps: target_bps,
                status: status.as_u8(),
            }
            .encode_log_data(),
            Event::DefaultVaultUpdated { old, new } => abi::DefaultVaultUpdated {
                oldVault: old.unwrap_or(Address::ZERO),
                newVault: new,
            }
            .encode_log_data(),
            Event::WithdrawalFeeUpdated { old_bps, new_bps } => abi::WithdrawalFeeUpdated {
                oldFeeBps: old_bps,
                newFeeBps: new_bps,
            }
            .encode_log_data(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Deposit {
                sender,
                owner,
                assets,
                shares,
            } => write!(f, "Deposit(sender={sender}, owner={owner}, assets={assets}, shares={shares})"),
            Event::Withdraw {
                sender,
                receiver,
                owner,
                assets,
                shares,
            } => write!(
                f,
                "Withdraw(sender={sender}, receiver={receiver}, owner={owner}, assets={assets}, shares={shares})"
            ),
            Event::Transfer { from, to, value } => {
                write!(f, "Transfer(from={from}, to={to}, value={value})")
            }
            Event::Approval {
                owner,
                spender,
                value,
            } => write!(f, "Approval(owner={owner}, spender={spender}, value={value})"),
            Event::SettlementShortfallUpdated { old, new } => {
                write!(f, "SettlementShortfallUpdated(old={old}, new={new})")
            }
            Event::SettlementRatioUpdated { old, new } => {
                write!(f, "SettlementRatioUpdated(old={old}, new={new})")
            }
            Event::RouterWithdrawSettled {
                vault,
                gross_assets,
                net_assets,
            } => write!(
                f,
                "RouterWithdrawSettled(vault={vault}, gross={gross_assets}, net={net_assets})"
            ),
            Event::VaultConfigured {
                vault,
                target_bps,
                status,
            } => write!(f, "VaultConfigured(vault={vault}, target_bps={target_bps}, status={status})"),
            Event::DefaultVaultUpdated { old, new } => match old {
                Some(old) => write!(f, "DefaultVaultUpdated(old={old}, new={new})"),
                None => write!(f, "DefaultVaultUpdated(old=none, new={new})"),
            },
            Event::WithdrawalFeeUpdated { old_bps, new_bps } => {
                write!(f, "WithdrawalFeeUpdated(old={old_bps}, new={new_bps})")
            }
        }
    }
}
