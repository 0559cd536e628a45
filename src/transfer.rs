//! Transfer compiler
//!
//! A transfer pairs a source `(path, type)` with a destination `(path, type)`.
//! A transfer set is assembled into a tree keyed by destination path segment
//! and serialized into one path expression for an external evaluator:
//!
//! ```text
//! items[].id,format=int   ->  {items:{id:items.#.id.@tonum,title:items.#.title.@tostring}|@group}
//! items[].title
//! ```
//!
//! Siblings are emitted in lexical order so the expression is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::item::is_descendant;
use crate::names::{modify_path, PathModifier};
use crate::schema::Lineschema;
use crate::types::{coercion_suffix, is_container, FormatTable};

/// Array wildcard segment
pub const WILDCARD: &str = "#";

/// Group-flatten modifier
pub const GROUP: &str = "|@group";

const THIS: &str = "@this";

// =============================================================================
// Transfer set
// =============================================================================

/// One side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferUnit {
    pub path: String,
    pub ty: String,
}

impl TransferUnit {
    pub fn new(path: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transfer {
    pub src: TransferUnit,
    pub dst: TransferUnit,
}

impl Transfer {
    pub fn new(src: TransferUnit, dst: TransferUnit) -> Self {
        Self { src, dst }
    }

    pub fn reverse(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }

    /// Source path with the coercion function for the destination type
    fn source_expression(&self) -> String {
        let base = if self.src.path.is_empty() { THIS } else { self.src.path.as_str() };
        match coercion_suffix(&self.dst.ty) {
            Some(suffix) => format!("{}{}", base, suffix),
            None => base.to_string(),
        }
    }
}

/// Ordered transfer set, unique by destination path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfers(Vec<Transfer>);

impl Transfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing an existing entry with the same destination path
    pub fn replace(&mut self, transfer: Transfer) {
        match self.0.iter_mut().find(|t| t.dst.path == transfer.dst.path) {
            Some(existing) => *existing = transfer,
            None => self.0.push(transfer),
        }
    }

    /// Wire to typed direction for a flattened schema.
    ///
    /// Containers with declared children are skipped; their leaves carry
    /// them. A leaf's destination type is the canonical type of its format,
    /// else its own type when that type has a coercion (`int`, `bool`, ...),
    /// else `object` for objects and `string` for everything else.
    pub fn to_format(schema: &Lineschema, formats: &FormatTable) -> Self {
        let items = schema.items();
        let mut transfers = Self::new();
        for item in items {
            if is_container(&item.ty)
                && items.iter().any(|other| is_descendant(&other.fullname, &item.fullname))
            {
                continue;
            }
            let src_path = item.src.clone().unwrap_or_else(|| item.path.clone());
            let dst_path = item.dst.clone().unwrap_or_else(|| item.path.clone());
            let dst_type = match item.format.as_deref().and_then(|f| formats.canonical(f)) {
                Some(ty) => ty.to_string(),
                None if item.ty == "object" => "object".to_string(),
                None if coercion_suffix(&item.ty).is_some() => item.ty.clone(),
                None => "string".to_string(),
            };
            transfers.replace(Transfer::new(
                TransferUnit::new(src_path, item.ty.clone()),
                TransferUnit::new(dst_path, dst_type),
            ));
        }
        transfers
    }

    /// Typed to wire direction: the reverse of [`Transfers::to_format`]
    pub fn to_type(schema: &Lineschema, formats: &FormatTable) -> Self {
        Self::to_format(schema, formats).reverse()
    }

    /// Wire (all-string) to typed transfers for a described value
    pub fn from_descriptors(descriptors: &[FieldDescriptor]) -> Self {
        let mut transfers = Self::new();
        for field in descriptors {
            let src = if field.path.is_empty() {
                THIS.to_string()
            } else {
                format!("{}.{}", THIS, field.path)
            };
            transfers.replace(Transfer::new(
                TransferUnit::new(src, "string"),
                TransferUnit::new(field.path.clone(), field.ty.clone()),
            ));
        }
        transfers
    }

    /// Swap source and destination on every pair
    pub fn reverse(&self) -> Self {
        Self(self.0.iter().map(Transfer::reverse).collect())
    }

    pub fn modify_dst_path(&self, modifiers: &[PathModifier]) -> Self {
        let mut out = Self::new();
        for t in &self.0 {
            let mut t = t.clone();
            t.dst.path = modify_path(&t.dst.path, modifiers);
            out.replace(t);
        }
        out
    }

    pub fn modify_src_path(&self, modifiers: &[PathModifier]) -> Self {
        let mut out = Self::new();
        for t in &self.0 {
            let mut t = t.clone();
            t.src.path = modify_path(&t.src.path, modifiers);
            out.replace(t);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize into a single path expression
    pub fn to_expression(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        if let [only] = self.0.as_slice() {
            if only.dst.path.is_empty() {
                return only.source_expression();
            }
        }

        let mut root: BTreeMap<String, Node> = BTreeMap::new();
        for transfer in &self.0 {
            let dst = normalize_dst(&transfer.dst.path);
            let segments: Vec<&str> = dst.split('.').collect();
            insert(&mut root, &segments, transfer.source_expression());
        }
        render(&root).0
    }
}

impl fmt::Display for Transfers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression())
    }
}

impl FromIterator<Transfer> for Transfers {
    fn from_iter<I: IntoIterator<Item = Transfer>>(iter: I) -> Self {
        let mut out = Self::new();
        for t in iter {
            out.replace(t);
        }
        out
    }
}

// =============================================================================
// Expression tree
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(String),
    Branch(BTreeMap<String, Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// A plain path, already array-shaped when it runs through `#`
    Path,
    /// `{...}`
    Object,
    /// `{...}|@group`
    Group,
}

fn normalize_dst(path: &str) -> String {
    let path = if path == THIS {
        ""
    } else {
        path.strip_prefix("@this.").unwrap_or(path)
    };
    path.trim_start_matches('.').to_string()
}

fn insert(map: &mut BTreeMap<String, Node>, segments: &[&str], src: String) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let key = first.to_string();

    if rest.is_empty() {
        match map.get(&key) {
            Some(Node::Branch(_)) => {
                warn!(key = %key, src = %src, "leaf shadowed by nested destination, dropped");
            }
            _ => {
                map.insert(key, Node::Leaf(src));
            }
        }
        return;
    }

    let entry = map
        .entry(key.clone())
        .or_insert_with(|| Node::Branch(BTreeMap::new()));
    if let Node::Leaf(old) = entry {
        warn!(key = %key, src = %old, "leaf replaced by nested destination, dropped");
        *entry = Node::Branch(BTreeMap::new());
    }
    if let Node::Branch(children) = entry {
        insert(children, rest, src);
    }
}

/// Render the children of one branch
fn render(children: &BTreeMap<String, Node>) -> (String, Form) {
    if children.len() == 1 {
        if let Some(only) = children.get(WILDCARD) {
            return match only {
                // array of scalars: the path already yields the array
                Node::Leaf(src) => (src.clone(), Form::Path),
                Node::Branch(grand) => match render(grand) {
                    (path, Form::Path) => (path, Form::Path),
                    (body, _) => (format!("{}{}", body, GROUP), Form::Group),
                },
            };
        }
    }

    let body: Vec<String> = children
        .iter()
        .map(|(key, node)| {
            let value = match node {
                Node::Leaf(src) => src.clone(),
                Node::Branch(grand) => render(grand).0,
            };
            if key.is_empty() || key == WILDCARD {
                value
            } else {
                format!("{}:{}", key, value)
            }
        })
        .collect();
    (format!("{{{}}}", body.join(",")), Form::Object)
}

// =============================================================================
// Descriptors
// =============================================================================

/// One addressable field of a described value: its path (`#` for array
/// elements, empty for a scalar root) and its typed representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub path: String,
    pub ty: String,
}

impl FieldDescriptor {
    pub fn new(path: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ty: ty.into(),
        }
    }
}

/// Explicit field listing for values that are transferred without a line
/// schema. Implementors list their leaves; containers are implied.
pub trait Describe {
    fn describe(&self) -> Vec<FieldDescriptor>;
}

impl Describe for Lineschema {
    /// Leaves of the (flattened) schema, typed through the built-in format table
    fn describe(&self) -> Vec<FieldDescriptor> {
        self.describe_with(&FormatTable::default())
    }
}

impl Lineschema {
    /// Leaves of the (flattened) schema with their typed representation
    pub fn describe_with(&self, formats: &FormatTable) -> Vec<FieldDescriptor> {
        let items = self.items();
        items
            .iter()
            .filter(|item| {
                !(is_container(&item.ty)
                    && items.iter().any(|other| is_descendant(&other.fullname, &item.fullname)))
            })
            .map(|item| {
                let ty = item
                    .format
                    .as_deref()
                    .and_then(|f| formats.canonical(f))
                    .unwrap_or(item.ty.as_str());
                FieldDescriptor::new(item.path.clone(), ty)
            })
            .collect()
    }
}
