//! Answer to a server's `/pair` request

use super::credential::PairingCredential;

/// Offset of the 8-byte credential inside [`PAIRING_ACK_TEMPLATE`]
pub const CREDENTIAL_OFFSET: usize = 16;

/// `cmpa` body returned to the server
///
/// The layout is fixed: `cmpg` holding the credential, `cmnm` with the
/// device name "Administrator’s iPod" and `cmty` "iPod". Servers match it
/// byte for byte, so only the credential slot is ever rewritten.
pub const PAIRING_ACK_TEMPLATE: [u8; 66] = [
    0x63, 0x6d, 0x70, 0x61, 0x00, 0x00, 0x00, 0x3a, // cmpa, 58
    0x63, 0x6d, 0x70, 0x67, 0x00, 0x00, 0x00, 0x08, // cmpg, 8
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // credential
    0x63, 0x6d, 0x6e, 0x6d, 0x00, 0x00, 0x00, 0x16, // cmnm, 22
    0x41, 0x64, 0x6d, 0x69, 0x6e, 0x69, 0x73, 0x74, 0x72, 0x61, 0x74, 0x6f, 0x72, 0xe2, 0x80,
    0x99, 0x73, 0x20, 0x69, 0x50, 0x6f, 0x64, // "Administrator’s iPod"
    0x63, 0x6d, 0x74, 0x79, 0x00, 0x00, 0x00, 0x04, // cmty, 4
    0x69, 0x50, 0x6f, 0x64, // "iPod"
];

/// Template with `credential` written into its slot
#[must_use]
pub fn pairing_ack(credential: PairingCredential) -> [u8; 66] {
    let mut body = PAIRING_ACK_TEMPLATE;
    body[CREDENTIAL_OFFSET..CREDENTIAL_OFFSET + 8].copy_from_slice(&credential.to_be_bytes());
    body
}
