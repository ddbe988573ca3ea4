//! Authentication: Ed25519 signature checks for agent-owned endpoints and
//! bearer-token checks for the administrative ones.

pub mod signature;
pub mod token;

// vim: ts=4
