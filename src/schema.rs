//! In-memory line schema
//!
//! A [`Lineschema`] owns its meta record and its items in parse order.
//! Lookups by fullname go through the owning schema.

use std::fmt;
use std::str::FromStr;

use crate::error::{LineschemaError, Result};
use crate::item::{Item, Meta};

/// A parsed (or flattened) line schema
#[derive(Debug, Clone, PartialEq)]
pub struct Lineschema {
    meta: Meta,
    items: Vec<Item>,
}

impl Lineschema {
    pub fn new(meta: Meta, items: Vec<Item>) -> Self {
        Self { meta, items }
    }

    /// Parse line-notation text
    pub fn parse(text: &str) -> Result<Self> {
        crate::parser::parse(text)
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Item declared at `fullname`. A later duplicate wins.
    pub fn item(&self, fullname: &str) -> Option<&Item> {
        self.items.iter().rev().find(|item| item.fullname == fullname)
    }

    /// Direct and indirect children of `fullname`, in document order
    pub fn descendants<'a>(&'a self, fullname: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .iter()
            .filter(move |item| crate::item::is_descendant(&item.fullname, fullname))
    }

    /// True when the root document is an array (`type=array` on the meta
    /// line, or every item starting with `[]`)
    pub fn is_array_root(&self) -> bool {
        if !self.meta.ty.is_empty() {
            return self.meta.ty == "array";
        }
        !self.items.is_empty() && self.items.iter().all(|item| item.fullname.starts_with("[]"))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Lineschema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.meta.to_line())?;
        for item in &self.items {
            writeln!(f, "{}", item.to_line())?;
        }
        Ok(())
    }
}

impl FromStr for Lineschema {
    type Err = LineschemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
