//! Team tokens
//!
//! Tokens are derived from a shared secret by chaining MD5:
//! `token[0] = md5(secret)`, `token[i] = md5(raw digest of token[i-1])`,
//! each rendered as lowercase hex. The position of a token in the table is the
//! team number, so anyone holding the secret can recompute the table and no
//! credential store is needed.
//!
//! Because every token is the hash of the previous digest, a holder of token
//! `i` can compute every token after it. The registry runs in a closed
//! environment where that is accepted; see DESIGN.md before relying on it
//! elsewhere.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Number of team slots when none is configured
pub const DEFAULT_TEAM_COUNT: usize = 20;

/// Team number, the index of the team's token in the [`TokenTable`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub usize);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TeamId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<usize>().map(TeamId)
    }
}

/// Fixed, ordered table of team tokens
#[derive(Clone)]
pub struct TokenTable {
    tokens: Vec<String>,
}

impl TokenTable {
    /// Derive `count` tokens from `secret`
    pub fn derive(secret: &str, count: usize) -> Self {
        let mut tokens = Vec::with_capacity(count);
        let mut seed = secret.as_bytes().to_vec();
        for _ in 0..count {
            let digest = Md5::digest(&seed);
            tokens.push(format!("{:x}", digest));
            seed = digest.to_vec();
        }
        Self { tokens }
    }

    /// Resolve a presented token to its team, if it is in the table
    pub fn lookup(&self, token: &str) -> Option<TeamId> {
        self.tokens.iter().position(|t| t == token).map(TeamId)
    }

    /// Token for a team slot
    pub fn token(&self, team: TeamId) -> Option<&str> {
        self.tokens.get(team.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate `(team, token)` pairs in team order
    pub fn iter(&self) -> impl Iterator<Item = (TeamId, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (TeamId(i), t.as_str()))
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenTable")
            .field("len", &self.tokens.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_token_is_md5_of_secret() {
        let table = TokenTable::derive("", 1);
        assert_eq!(table.token(TeamId(0)), Some("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn test_tokens_chain_over_raw_digest() {
        let table = TokenTable::derive("dojo", 3);

        let first = Md5::digest(b"dojo");
        let second = Md5::digest(&first);
        let third = Md5::digest(&second);

        assert_eq!(table.token(TeamId(0)), Some(format!("{:x}", first).as_str()));
        assert_eq!(table.token(TeamId(1)), Some(format!("{:x}", second).as_str()));
        assert_eq!(table.token(TeamId(2)), Some(format!("{:x}", third).as_str()));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = TokenTable::derive("shared-secret", DEFAULT_TEAM_COUNT);
        let b = TokenTable::derive("shared-secret", DEFAULT_TEAM_COUNT);
        let c = TokenTable::derive("other-secret", DEFAULT_TEAM_COUNT);

        assert_eq!(a.len(), DEFAULT_TEAM_COUNT);
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x == y));
        assert_ne!(a.token(TeamId(0)), c.token(TeamId(0)));
    }

    #[test]
    fn test_tokens_are_fixed_width_hex() {
        let table = TokenTable::derive("s", 5);
        for (_, token) in table.iter() {
            assert_eq!(token.len(), 32);
            assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_lookup() {
        let table = TokenTable::derive("s", DEFAULT_TEAM_COUNT);
        let token = table.token(TeamId(11)).unwrap().to_string();

        assert_eq!(table.lookup(&token), Some(TeamId(11)));
        assert_eq!(table.lookup("not-a-token"), None);
        assert_eq!(table.lookup(""), None);
        assert_eq!(table.lookup(&token.to_uppercase()), None);
    }

    #[test]
    fn test_empty_table() {
        let table = TokenTable::derive("s", 0);
        assert!(table.is_empty());
        assert_eq!(table.lookup("d41d8cd98f00b204e9800998ecf8427e"), None);
        assert_eq!(table.token(TeamId(0)), None);
    }

    #[test]
    fn test_team_id_parse_and_display() {
        assert_eq!("4".parse::<TeamId>(), Ok(TeamId(4)));
        assert!("-1".parse::<TeamId>().is_err());
        assert!("four".parse::<TeamId>().is_err());
        assert_eq!(TeamId(11).to_string(), "11");
    }

    #[test]
    fn test_debug_hides_tokens() {
        let table = TokenTable::derive("", 2);
        let debug = format!("{:?}", table);
        assert!(!debug.contains("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(debug.contains("len: 2"));
    }
}
