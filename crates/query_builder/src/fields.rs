/// Nested selection set expanded from dot-paths such as `address.city`.
///
/// Children keep first-insertion order so equal inputs render identically;
/// repeated paths collapse into one selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTree {
    children: Vec<(String, FieldTree)>,
}

impl FieldTree {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        for path in paths {
            tree.insert_path(path.as_ref());
        }
        tree
    }

    pub fn insert_path(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('.').map(str::trim).filter(|s| !s.is_empty()) {
            let index = match node.children.iter().position(|(name, _)| name == segment) {
                Some(index) => index,
                None => {
                    node.children.push((segment.to_string(), Self::default()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index].1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Writes `{ a b { c } }`; nothing for an empty tree.
    pub fn render(&self, out: &mut String) {
        if self.children.is_empty() {
            return;
        }
        out.push('{');
        for (name, child) in &self.children {
            out.push(' ');
            out.push_str(name);
            if !child.is_empty() {
                out.push(' ');
                child.render(out);
            }
        }
        out.push_str(" }");
    }
}
