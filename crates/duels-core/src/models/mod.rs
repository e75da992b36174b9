//! Data models exchanged with the duels API.
//!
//! - `User`: the signed-in user's profile
//! - `TokenPair`, `SignInResponse`: authentication payloads
//! - `Duel`, `DuelStatus`, `DuelDetail`: duels as listed by the API
//! - Duel action params and `WalletAction`

pub mod auth;
pub mod duel;
pub mod user;

pub use auth::{SignInRequest, SignInResponse, TokenPair};
pub use duel::{
    CreateDuelParams, Duel, DuelDetail, DuelStatus, JoinDuelParams, ResolveDuelParams,
    WalletAction,
};
pub use user::User;
