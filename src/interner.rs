use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

/// Interned symbol identifier. Two symbols with the same spelling always
/// share the same `SymId`, so symbol comparison is a `u32` compare.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct SymId(pub u32);

/// Kernel symbols are plain spellings with no namespaces or keyword
/// variants, so one flat text↔id table covers the whole language.
struct Interner {
    ids: FxHashMap<String, u32>,
    texts: Vec<String>,
}

impl Interner {
    fn new() -> Self {
        Self { ids: FxHashMap::default(), texts: Vec::new() }
    }

    fn intern(&mut self, text: &str) -> SymId {
        if let Some(&id) = self.ids.get(text) {
            return SymId(id);
        }
        let id = self.texts.len() as u32;
        self.texts.push(text.to_owned());
        self.ids.insert(text.to_owned(), id);
        SymId(id)
    }

    fn resolve(&self, id: SymId) -> &str {
        &self.texts[id.0 as usize]
    }
}

static INTERNER: Lazy<Mutex<Interner>> = Lazy::new(|| Mutex::new(Interner::new()));

pub fn intern_sym(text: &str) -> SymId {
    INTERNER.lock().unwrap().intern(text)
}

pub fn sym_to_str(id: SymId) -> String {
    INTERNER.lock().unwrap().resolve(id).to_owned()
}
