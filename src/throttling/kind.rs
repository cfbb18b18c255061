//! Named throttlers and the algorithm behind each.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three rate-limiting algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Counter per key; the window opens on the first hit.
    FixedCounter,
    /// Counter per key and type, checked and incremented in one step.
    FixedWindow,
    /// Refilling bucket; needs a rate of at least one per second.
    TokenBucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleKind {
    Arbitrary,
    Ip,
    Token,
    ClientCredentials,
    RefreshSession,
    StoreLocation,
    Username,
    #[serde(rename = "access_token_req_sec")]
    AccessTokenRate,
}

impl ThrottleKind {
    pub const ALL: [ThrottleKind; 8] = [
        ThrottleKind::Arbitrary,
        ThrottleKind::Ip,
        ThrottleKind::Token,
        ThrottleKind::ClientCredentials,
        ThrottleKind::RefreshSession,
        ThrottleKind::StoreLocation,
        ThrottleKind::Username,
        ThrottleKind::AccessTokenRate,
    ];

    /// Discriminator mixed into every cache key of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleKind::Arbitrary => "arbitrary",
            ThrottleKind::Ip => "ip",
            ThrottleKind::Token => "token",
            ThrottleKind::ClientCredentials => "client_credentials",
            ThrottleKind::RefreshSession => "refresh_session",
            ThrottleKind::StoreLocation => "store_location",
            ThrottleKind::Username => "username",
            ThrottleKind::AccessTokenRate => "access_token_req_sec",
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            ThrottleKind::Arbitrary | ThrottleKind::Ip | ThrottleKind::Token => Algorithm::FixedCounter,
            ThrottleKind::ClientCredentials
            | ThrottleKind::RefreshSession
            | ThrottleKind::StoreLocation
            | ThrottleKind::Username => Algorithm::FixedWindow,
            ThrottleKind::AccessTokenRate => Algorithm::TokenBucket,
        }
    }
}

impl fmt::Display for ThrottleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
