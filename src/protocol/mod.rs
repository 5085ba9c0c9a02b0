//! Protocol module
//!
//! [`daap`] decodes what the server sends, [`dacp`] builds what the remote
//! asks for, and [`pairing`] bootstraps the credential that `/login` needs.

pub mod daap;
pub mod dacp;
pub mod pairing;
