//! Standard security handler over lopdf's key derivation.
//!
//! lopdf derives and checks the file key for revisions 2 to 4. Applying the
//! key to the object graph happens here so RC4 files without a `/CF`
//! dictionary and strings nested inside dictionaries are covered as well.

use std::panic::{self, AssertUnwindSafe};

use lopdf::encryption::{self, DecryptionError};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::EngineError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cipher {
    Identity,
    Rc4,
    Aes128,
}

/// How strings and streams of one document are encrypted.
#[derive(Debug, Clone)]
pub(crate) struct SecurityHandler {
    strings: Cipher,
    streams: Cipher,
    encrypt_metadata: bool,
}

impl SecurityHandler {
    /// Read the encryption dictionary.
    ///
    /// Schemes this engine cannot decrypt fail here, before anyone is asked
    /// for a password.
    pub(crate) fn from_document(document: &Document) -> Result<Self> {
        let dict = document
            .get_encrypted()
            .map_err(|e| EngineError::Parse(format!("encryption dictionary: {e}")))?;

        let filter = dict
            .get(b"Filter")
            .and_then(Object::as_name)
            .unwrap_or(&b"Standard"[..]);
        if filter != b"Standard" {
            return Err(EngineError::UnsupportedEncryption(format!(
                "security handler /{}",
                String::from_utf8_lossy(filter)
            )));
        }

        let revision = dict.get(b"R").and_then(Object::as_i64).unwrap_or(0);
        if !(2..=4).contains(&revision) {
            return Err(EngineError::UnsupportedEncryption(format!(
                "standard security handler revision {revision}"
            )));
        }

        let version = dict.get(b"V").and_then(Object::as_i64).unwrap_or(0);
        let (strings, streams) = match version {
            1 | 2 => (Cipher::Rc4, Cipher::Rc4),
            4 => (crypt_filter(dict, b"StrF")?, crypt_filter(dict, b"StmF")?),
            other => {
                return Err(EngineError::UnsupportedEncryption(format!(
                    "encryption algorithm V{other}"
                )));
            }
        };

        // lopdf compares the first 16 bytes of /U without a length check.
        if let Ok(Object::String(user, _)) = dict.get(b"U") {
            if user.len() < 16 {
                return Err(EngineError::Parse(
                    "encryption dictionary: /U is shorter than 16 bytes".to_string(),
                ));
            }
        }

        let encrypt_metadata = dict
            .get(b"EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        Ok(Self {
            strings,
            streams,
            encrypt_metadata,
        })
    }

    /// File key for `password`, or `None` when the password is rejected.
    pub(crate) fn key_for(&self, document: &Document, password: &str) -> Result<Option<Vec<u8>>> {
        match encryption::get_encryption_key(document, password, true) {
            Ok(key) => Ok(Some(key)),
            Err(DecryptionError::IncorrectPassword) => Ok(None),
            Err(
                e @ (DecryptionError::UnsupportedEncryption
                | DecryptionError::InvalidRevision
                | DecryptionError::InvalidKeyLength),
            ) => Err(EngineError::UnsupportedEncryption(e.to_string())),
            Err(e) => Err(EngineError::Parse(format!("encryption dictionary: {e}"))),
        }
    }

    /// Replace every encrypted string and stream with its plaintext and drop
    /// the `/Encrypt` entry.
    pub(crate) fn decrypt(&self, document: &mut Document, key: &[u8]) -> Result<()> {
        let encrypt_id = document
            .trailer
            .get(b"Encrypt")
            .and_then(Object::as_reference)
            .ok();

        for (&id, object) in document.objects.iter_mut() {
            if Some(id) == encrypt_id {
                continue;
            }
            self.decrypt_object(key, id, object)?;
        }

        document.trailer.remove(b"Encrypt");
        Ok(())
    }

    fn decrypt_object(&self, key: &[u8], id: ObjectId, object: &mut Object) -> Result<()> {
        match object {
            Object::String(..) => {
                let plain = open(self.strings, key, id, object)?;
                if let Object::String(content, _) = object {
                    *content = plain;
                }
            }
            Object::Array(items) => {
                for item in items {
                    self.decrypt_object(key, id, item)?;
                }
            }
            Object::Dictionary(dict) => self.decrypt_dict(key, id, dict)?,
            Object::Stream(stream) => {
                self.decrypt_dict(key, id, &mut stream.dict)?;
                if !self.is_stream_encrypted(&stream.dict) {
                    return Ok(());
                }
                let plain = open(self.streams, key, id, object)?;
                if let Object::Stream(stream) = object {
                    stream.set_content(plain);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn decrypt_dict(&self, key: &[u8], id: ObjectId, dict: &mut Dictionary) -> Result<()> {
        for (_, value) in dict.iter_mut() {
            self.decrypt_object(key, id, value)?;
        }
        Ok(())
    }

    fn is_stream_encrypted(&self, dict: &Dictionary) -> bool {
        match dict.get(b"Type").and_then(Object::as_name) {
            Ok(b"XRef") => false,
            Ok(b"Metadata") => self.encrypt_metadata,
            _ => true,
        }
    }
}

/// Cipher named by a V4 `/StrF` or `/StmF` entry.
fn crypt_filter(dict: &Dictionary, entry: &[u8]) -> Result<Cipher> {
    let name = dict
        .get(entry)
        .and_then(Object::as_name)
        .unwrap_or(&b"Identity"[..]);
    if name == b"Identity" {
        return Ok(Cipher::Identity);
    }

    let method = dict
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|filters| filters.get(name))
        .and_then(Object::as_dict)
        .and_then(|filter| filter.get(b"CFM"))
        .and_then(Object::as_name)
        .unwrap_or(&b"None"[..]);

    match method {
        b"None" => Ok(Cipher::Identity),
        b"V2" => Ok(Cipher::Rc4),
        b"AESV2" => Ok(Cipher::Aes128),
        other => Err(EngineError::UnsupportedEncryption(format!(
            "crypt filter method /{}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn open(cipher: Cipher, key: &[u8], id: ObjectId, object: &Object) -> Result<Vec<u8>> {
    let content = match object {
        Object::String(content, _) => content,
        Object::Stream(stream) => &stream.content,
        _ => return Ok(Vec::new()),
    };

    match cipher {
        Cipher::Identity => Ok(content.clone()),
        Cipher::Rc4 => encryption::decrypt_object(key, id, object, false)
            .map_err(|e| EngineError::Parse(format!("object {} {}: {e}", id.0, id.1))),
        Cipher::Aes128 if content.is_empty() => Ok(Vec::new()),
        Cipher::Aes128 => {
            // IV plus at least one whole block.
            if content.len() < 32 || content.len() % 16 != 0 {
                return Err(EngineError::Parse(format!(
                    "object {} {}: AES data has invalid length {}",
                    id.0,
                    id.1,
                    content.len()
                )));
            }
            // lopdf unwraps the padding check.
            panic::catch_unwind(AssertUnwindSafe(|| {
                encryption::decrypt_object(key, id, object, true)
            }))
            .map_err(|_| EngineError::Parse(format!("object {} {}: bad AES padding", id.0, id.1)))?
            .map_err(|e| EngineError::Parse(format!("object {} {}: {e}", id.0, id.1)))
        }
    }
}
