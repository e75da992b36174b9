//! SPL token balances and associated token account derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

use spl_associated_token_account_client::address::get_associated_token_address_with_program_id;

use super::{parse_pubkey, Pubkey};
use crate::Result;

/// SPL token program
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// USDC mint on mainnet
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

pub const USDC_DECIMALS: u8 = 6;

/// A token balance in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn zero(decimals: u8) -> Self {
        Self { amount: 0, decimals }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

impl fmt::Display for TokenAmount {
    /// Exact decimal rendering without trailing zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimals = usize::from(self.decimals);
        if decimals == 0 {
            return write!(f, "{}", self.amount);
        }
        let digits = format!("{:0>width$}", self.amount, width = decimals + 1);
        let (whole, frac) = digits.split_at(digits.len() - decimals);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{}", whole, frac)
        }
    }
}

/// Derives the associated token account holding `mint` for `owner`.
///
/// Pure: the same three inputs always yield the same address.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, token_program)
}

/// The token whose balance the client tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMint {
    pub mint: Pubkey,
    pub decimals: u8,
    token_program: Pubkey,
}

impl TokenMint {
    pub fn new(mint: &str, decimals: u8) -> Result<Self> {
        Ok(Self {
            mint: parse_pubkey(mint)?,
            decimals,
            token_program: parse_pubkey(TOKEN_PROGRAM_ID)?,
        })
    }

    pub fn usdc() -> Result<Self> {
        Self::new(USDC_MINT, USDC_DECIMALS)
    }

    pub fn associated_token_address(&self, owner: &Pubkey) -> Pubkey {
        associated_token_address(owner, &self.mint, &self.token_program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Pubkey {
        parse_pubkey("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin").expect("valid owner")
    }

    #[test]
    fn test_token_amount_display() {
        assert_eq!(TokenAmount { amount: 1_500_000, decimals: 6 }.to_string(), "1.5");
        assert_eq!(TokenAmount { amount: 42, decimals: 6 }.to_string(), "0.000042");
        assert_eq!(TokenAmount { amount: 3_000_000, decimals: 6 }.to_string(), "3");
        assert_eq!(TokenAmount::zero(6).to_string(), "0");
        assert_eq!(TokenAmount { amount: 7, decimals: 0 }.to_string(), "7");
    }

    #[test]
    fn test_ui_amount() {
        let amount = TokenAmount { amount: 2_500_000, decimals: 6 };
        assert!((amount.ui_amount() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_usdc_token_account() {
        let usdc = TokenMint::usdc().expect("valid mint");
        let account = usdc.associated_token_address(&owner());
        assert_eq!(account.to_string(), "F4YA4H7HeXLCvjLRKdh56FgE4cyHpPqLP1VCM6fEqEmX");
        assert!(!account.is_on_curve());
    }

    #[test]
    fn test_token_account_seeds() {
        let usdc = TokenMint::usdc().expect("valid mint");
        let token_program = parse_pubkey(TOKEN_PROGRAM_ID).expect("token program");
        let (expected, _bump) = Pubkey::find_program_address(
            &[owner().as_ref(), token_program.as_ref(), usdc.mint.as_ref()],
            &parse_pubkey("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL").expect("ata program"),
        );
        assert_eq!(usdc.associated_token_address(&owner()), expected);
    }

    #[test]
    fn test_associated_address_depends_on_mint() {
        let usdc = TokenMint::usdc().expect("valid mint");
        let wrapped_sol = TokenMint::new("So11111111111111111111111111111111111111112", 9)
            .expect("valid mint");
        assert_ne!(
            usdc.associated_token_address(&owner()),
            wrapped_sol.associated_token_address(&owner())
        );
        assert_eq!(
            usdc.associated_token_address(&owner()),
            usdc.associated_token_address(&owner())
        );
    }

    #[test]
    fn test_invalid_mint_is_rejected() {
        assert!(matches!(
            TokenMint::new("not-a-mint", 6),
            Err(crate::Error::InvalidAddress(_))
        ));
    }
}
