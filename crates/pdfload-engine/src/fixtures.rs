//! In-memory PDF builder for tests.

use lopdf::encryption::{decrypt_object, get_encryption_key};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Description of a small test document.
#[derive(Debug, Clone)]
pub struct Fixture {
    pages: u32,
    info: Vec<(String, String)>,
    xmp: Option<String>,
    attachments: Vec<(String, String, Vec<u8>)>,
    scripts: Vec<(String, String)>,
    open_action_script: Option<String>,
    id: Option<Vec<u8>>,
    broken_names: bool,
    encryption: Option<Encryption>,
}

#[derive(Debug, Clone)]
enum Encryption {
    /// 40-bit RC4, standard security handler revision 2.
    Rc4 { user_password: String },
    /// AES-256 dictionary (revision 6) with no usable content.
    Aes256,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            pages: 1,
            info: Vec::new(),
            xmp: None,
            attachments: Vec::new(),
            scripts: Vec::new(),
            open_action_script: None,
            id: None,
            broken_names: false,
            encryption: None,
        }
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    pub fn title(self, title: &str) -> Self {
        self.info("Title", title)
    }

    pub fn author(self, author: &str) -> Self {
        self.info("Author", author)
    }

    pub fn info(mut self, key: &str, value: &str) -> Self {
        self.info.push((key.to_string(), value.to_string()));
        self
    }

    pub fn xmp(mut self, packet: &str) -> Self {
        self.xmp = Some(packet.to_string());
        self
    }

    pub fn attachment(mut self, key: &str, filename: &str, content: &[u8]) -> Self {
        self.attachments
            .push((key.to_string(), filename.to_string(), content.to_vec()));
        self
    }

    pub fn script(mut self, key: &str, source: &str) -> Self {
        self.scripts.push((key.to_string(), source.to_string()));
        self
    }

    pub fn open_action_script(mut self, source: &str) -> Self {
        self.open_action_script = Some(source.to_string());
        self
    }

    pub fn id(mut self, id: &[u8]) -> Self {
        self.id = Some(id.to_vec());
        self
    }

    /// Make the catalog `/Names` entry something other than a dictionary.
    pub fn broken_names(mut self) -> Self {
        self.broken_names = true;
        self
    }

    /// Encrypt strings and streams with RC4 under `user_password`.
    ///
    /// An empty password gives a document that opens without prompting.
    pub fn encrypted(mut self, user_password: &str) -> Self {
        self.encryption = Some(Encryption::Rc4 {
            user_password: user_password.to_string(),
        });
        self
    }

    /// Attach an AES-256 encryption dictionary, which the engine cannot open.
    pub fn aes256_encrypted(mut self) -> Self {
        self.encryption = Some(Encryption::Aes256);
        self
    }
}

/// Serialize the fixture to PDF bytes.
pub fn build(fixture: &Fixture) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));

    let kids: Vec<Object> = (0..fixture.pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => fixture.pages as i64,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };

    if let Some(packet) = &fixture.xmp {
        let metadata_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
            packet.as_bytes().to_vec(),
        ));
        catalog.set("Metadata", metadata_id);
    }

    if fixture.broken_names {
        catalog.set("Names", 5);
    } else {
        let mut names = dictionary! {};
        let mut has_names = false;

        if !fixture.attachments.is_empty() {
            let mut entries = Vec::new();
            for (key, filename, content) in sorted(&fixture.attachments, |a| &a.0) {
                let stream_id = doc.add_object(Stream::new(
                    dictionary! { "Type" => "EmbeddedFile" },
                    content.clone(),
                ));
                let spec_id = doc.add_object(dictionary! {
                    "Type" => "Filespec",
                    "F" => Object::string_literal(filename.as_str()),
                    "UF" => Object::string_literal(filename.as_str()),
                    "EF" => dictionary! { "F" => stream_id },
                });
                entries.push(Object::string_literal(key.as_str()));
                entries.push(spec_id.into());
            }
            names.set("EmbeddedFiles", dictionary! { "Names" => entries });
            has_names = true;
        }

        if !fixture.scripts.is_empty() {
            let mut entries = Vec::new();
            for (key, source) in sorted(&fixture.scripts, |s| &s.0) {
                let action_id = doc.add_object(dictionary! {
                    "S" => "JavaScript",
                    "JS" => Object::string_literal(source.as_str()),
                });
                entries.push(Object::string_literal(key.as_str()));
                entries.push(action_id.into());
            }
            // Intermediate node so the walker has to follow /Kids.
            let leaf_id = doc.add_object(dictionary! { "Names" => entries });
            names.set("JavaScript", dictionary! { "Kids" => vec![Object::from(leaf_id)] });
            has_names = true;
        }

        if has_names {
            let names_id = doc.add_object(names);
            catalog.set("Names", names_id);
        }
    }

    if let Some(source) = &fixture.open_action_script {
        let js_id = doc.add_object(Stream::new(dictionary! {}, source.as_bytes().to_vec()));
        catalog.set(
            "OpenAction",
            dictionary! {
                "S" => "JavaScript",
                "JS" => js_id,
            },
        );
    }

    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    if !fixture.info.is_empty() {
        let mut info = dictionary! {};
        for (key, value) in &fixture.info {
            info.set(key.as_bytes().to_vec(), Object::string_literal(value.as_str()));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);
    }

    if let Some(id) = &fixture.id {
        doc.trailer.set(
            "ID",
            vec![
                Object::string_literal(id.clone()),
                Object::string_literal(id.clone()),
            ],
        );
    }

    match &fixture.encryption {
        Some(Encryption::Rc4 { user_password }) => encrypt_rc4(&mut doc, user_password),
        Some(Encryption::Aes256) => {
            ensure_id(&mut doc);
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => 5,
                "R" => 6,
                "Length" => 256,
                "O" => hex(vec![0x11; 48]),
                "U" => hex(vec![0x22; 48]),
                "OE" => hex(vec![0x33; 32]),
                "UE" => hex(vec![0x44; 32]),
                "P" => -4,
            });
            doc.trailer.set("Encrypt", encrypt_id);
        }
        None => {}
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("in-memory save cannot fail");
    bytes
}

/// Padding string of the standard security handler.
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn encrypt_rc4(doc: &mut Document, user_password: &str) {
    ensure_id(doc);
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "O" => hex(vec![0x5A; 32]),
        "P" => -44,
    });
    doc.trailer.set("Encrypt", encrypt_id);

    // /U does not feed the key, so it can be derived before /U exists.
    let key = get_encryption_key(&*doc, user_password, false)
        .expect("fixture encryption dictionary is complete");
    if let Some(Object::Dictionary(dict)) = doc.objects.get_mut(&encrypt_id) {
        dict.set("U", hex(rc4(&key, &PASSWORD_PADDING)));
    }

    for (&id, object) in doc.objects.iter_mut() {
        if id != encrypt_id {
            seal(&key, id, object);
        }
    }
}

/// RC4 is symmetric, so lopdf's object decryption also encrypts.
fn seal(key: &[u8], id: ObjectId, object: &mut Object) {
    match object {
        Object::String(..) => {
            let sealed = decrypt_object(key, id, object, false).expect("string is decryptable");
            *object = hex(sealed);
        }
        Object::Array(items) => items.iter_mut().for_each(|item| seal(key, id, item)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, value)| seal(key, id, value)),
        Object::Stream(stream) => {
            stream.dict.iter_mut().for_each(|(_, value)| seal(key, id, value));
            let sealed = decrypt_object(key, id, object, false).expect("stream is decryptable");
            if let Object::Stream(stream) = object {
                stream.set_content(sealed);
            }
        }
        _ => {}
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255).collect();
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            byte ^ state[state[i as usize].wrapping_add(state[j as usize]) as usize]
        })
        .collect()
}

fn ensure_id(doc: &mut Document) {
    if doc.trailer.get(b"ID").is_err() {
        let id = Object::string_literal(b"pdfload-fixture".to_vec());
        doc.trailer.set("ID", vec![id.clone(), id]);
    }
}

fn hex(bytes: Vec<u8>) -> Object {
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn sorted<T, K: Ord + ?Sized>(items: &[T], key: impl Fn(&T) -> &K) -> Vec<&T> {
    let mut items: Vec<&T> = items.iter().collect();
    items.sort_by(|a, b| key(a).cmp(key(b)));
    items
}
