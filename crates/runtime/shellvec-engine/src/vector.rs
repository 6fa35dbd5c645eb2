//! Vectors and the per-module vector registry

use shellvec_core::{Capability, CapabilitySet, Error, Result};

/// One payload template tied to an interpreter capability.
///
/// `%s` marks a positional substitution slot; `%%` is a literal percent sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vector {
    pub name: String,
    pub capability: Capability,
    pub template: String,
}

impl Vector {
    pub fn new(name: &str, capability: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            capability: Capability::new(capability),
            template: template.to_string(),
        }
    }

    pub fn slots(&self) -> usize {
        expand::<&str>(&self.template, &[]).0
    }

    /// Fill every slot in order. The argument count must equal the slot count.
    pub fn fill<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let (slots, filled) = expand(&self.template, args);
        if slots != args.len() {
            return Err(Error::TemplateMismatch {
                vector: self.name.clone(),
                slots,
                supplied: args.len(),
            });
        }
        Ok(filled)
    }
}

fn expand<S: AsRef<str>>(template: &str, args: &[S]) -> (usize, String) {
    let mut out = String::with_capacity(template.len());
    let mut slots = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                if let Some(arg) = args.get(slots) {
                    out.push_str(arg.as_ref());
                }
                slots += 1;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    (slots, out)
}

/// Ordered set of vectors. Declaration order is trial order.
#[derive(Debug, Clone, Default)]
pub struct VectorRegistry {
    vectors: Vec<Vector>,
}

impl VectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, vector: Vector) -> Result<Self> {
        self.push(vector)?;
        Ok(self)
    }

    pub fn push(&mut self, vector: Vector) -> Result<()> {
        if self.vectors.iter().any(|v| v.name == vector.name) {
            return Err(Error::Initialization(format!("duplicate vector '{}'", vector.name)));
        }
        self.vectors.push(vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vector> {
        self.vectors.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.vectors.iter().map(|v| v.name.clone()).collect()
    }

    /// Every vector whose capability is available, in declaration order.
    pub fn by_capabilities(&self, available: &CapabilitySet) -> Vec<&Vector> {
        self.vectors
            .iter()
            .filter(|v| available.contains(&v.capability))
            .collect()
    }

    pub fn by_name(&self, name: &str) -> Result<&Vector> {
        self.vectors
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| Error::VectorNotFound(name.to_string()))
    }

    /// The forced vector alone when one is given, otherwise capability selection.
    pub fn select(&self, forced: Option<&str>, available: &CapabilitySet) -> Result<Vec<&Vector>> {
        match forced {
            Some(name) => Ok(vec![self.by_name(name)?]),
            None => Ok(self.by_capabilities(available)),
        }
    }
}
