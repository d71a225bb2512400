use bytes::Bytes;
use hex::FromHex;
use sha1::{Digest, Sha1};
use tracing::trace;

/// Incrementally hashes data passing through, and compares the final hash against an expected one
pub trait ChecksumValidator: Send {
    fn algorithm(&self) -> &'static str;
    fn add_data(&mut self, data: &Bytes);
    /// Err((expected, actual)) as hex strings if the data does not match
    fn do_validate(&self) -> Result<(), (String, String)>;
}

pub struct Sha1Validator {
    hasher: Sha1,
    expected_hash: [u8; 20],
}
impl Sha1Validator {
    pub fn new(expected_hash: [u8; 20]) -> Sha1Validator {
        Sha1Validator {
            hasher: Default::default(),
            expected_hash,
        }
    }
}
impl ChecksumValidator for Sha1Validator {
    fn algorithm(&self) -> &'static str {
        "SHA1"
    }

    fn add_data(&mut self, data: &Bytes) {
        self.hasher.update(data);
    }

    fn do_validate(&self) -> Result<(), (String, String)> {
        let hash: [u8; 20] = self.hasher.clone().finalize().into();
        trace!("validating SHA1 hash");
        if hash == self.expected_hash {
            Ok(())
        }
        else {
            Err((hex::encode(self.expected_hash), hex::encode(hash)))
        }
    }
}

pub struct Md5Validator {
    context: md5::Context,
    expected_hash: [u8; 16],
}
impl Md5Validator {
    pub fn new(expected_hash: [u8; 16]) -> Md5Validator {
        Md5Validator {
            context: md5::Context::new(),
            expected_hash,
        }
    }
}
impl ChecksumValidator for Md5Validator {
    fn algorithm(&self) -> &'static str {
        "MD5"
    }

    fn add_data(&mut self, data: &Bytes) {
        self.context.consume(data);
    }

    fn do_validate(&self) -> Result<(), (String, String)> {
        let hash: [u8; 16] = self.context.clone()
            .compute()
            .into();
        trace!("validating MD5 hash");
        if hash == self.expected_hash {
            Ok(())
        }
        else {
            Err((hex::encode(self.expected_hash), hex::encode(hash)))
        }
    }
}

/// Extracts a hex hash from a checksum file or header. Sidecar files sometimes carry the file name
///  after the hash ("<hash>  name.jar"), Nexus style etags wrap it ("{SHA1{<hash>}}") or quote it.
pub fn parse_hex_hash<const N: usize>(text: &str) -> Option<[u8; N]>
where
    [u8; N]: FromHex,
{
    let token = text.split_whitespace().next()?;
    let token = token.trim_matches(|c: char| c == '"' || c == '{' || c == '}');
    let token = token.strip_prefix("SHA1{").unwrap_or(token);
    if token.len() != N * 2 {
        return None;
    }
    <[u8; N]>::from_hex(token).ok()
}
