use std::collections::HashMap;

/// Index over the committed naming records, both directions.
#[derive(Debug, Default)]
pub struct NameIndex {
    by_filename: HashMap<String, Vec<u8>>,
    by_metahash: HashMap<String, String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: &str, metahash: &[u8]) {
        self.by_filename
            .insert(filename.to_string(), metahash.to_vec());
        self.by_metahash
            .insert(hex::encode(metahash), filename.to_string());
    }

    pub fn metahash_of(&self, filename: &str) -> Option<&[u8]> {
        self.by_filename.get(filename).map(|m| m.as_slice())
    }

    pub fn filename_of(&self, metahash: &[u8]) -> Option<&str> {
        self.by_metahash
            .get(&hex::encode(metahash))
            .map(|f| f.as_str())
    }

    pub fn contains_filename(&self, filename: &str) -> bool {
        self.by_filename.contains_key(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_directions() {
        let mut index = NameIndex::new();
        index.insert("a.txt", &[1, 2, 3]);
        assert_eq!(index.metahash_of("a.txt"), Some([1, 2, 3].as_slice()));
        assert_eq!(index.filename_of(&[1, 2, 3]), Some("a.txt"));
        assert!(index.contains_filename("a.txt"));
        assert!(!index.contains_filename("b.txt"));
    }
}
