//! Reference resolution (flatten)
//!
//! Removes every named-structure type reference so that each item addresses
//! a concrete leaf:
//!
//! 1. Reference graph check: type names form a petgraph graph and any
//!    strongly connected component that loops is rejected before expansion.
//! 2. Array pass: `[]E` types move their array marker onto the fullname.
//! 3. Object pass: a use site of type `T` is replaced by a reparented copy of
//!    the `T.` prototype subtree.
//!
//! Both passes work on owned copies; the input schema is never touched.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use crate::error::{ReferenceError, Result};
use crate::item::{is_descendant, Item};
use crate::schema::Lineschema;
use crate::types::{array_element, is_user_type, ARRAY_PREFIX};

/// Flatten all type references. Pure: returns a new schema.
pub fn resolve_refs(schema: &Lineschema) -> Result<Lineschema> {
    check_reference_cycles(schema.items())?;

    let items = resolve_array_refs(schema.items().to_vec());
    let items = resolve_object_refs(items)?;

    debug!(
        id = %schema.id(),
        before = schema.len(),
        after = items.len(),
        "flattened line schema"
    );
    Ok(Lineschema::new(schema.meta().clone(), items))
}

// =============================================================================
// Reference graph
// =============================================================================

/// Type-name graph: edge `A -> B` labelled with the field of `A` that uses `B`
struct ReferenceGraph {
    graph: DiGraph<String, String>,
    nodes: HashMap<String, NodeIndex>,
}

impl ReferenceGraph {
    fn build(items: &[Item]) -> Self {
        let mut rg = Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        };

        // document order keeps node indices, and so error reports, stable
        let mut seen: HashSet<&str> = HashSet::new();
        let referenced: Vec<&str> = items
            .iter()
            .filter_map(|item| referenced_type(&item.ty))
            .filter(|ty| seen.insert(*ty))
            .collect();

        for ty in &referenced {
            rg.node(ty);
        }

        for item in items {
            // array alias `D,type=[]E` used as a type elsewhere
            if seen.contains(item.fullname.as_str()) {
                if let Some(elem) = referenced_type(&item.ty) {
                    rg.add_edge(&item.fullname, elem, &item.fullname);
                }
            }
        }

        for ty in &referenced {
            for item in items.iter().filter(|i| is_descendant(&i.fullname, ty)) {
                if let Some(target) = referenced_type(&item.ty) {
                    rg.add_edge(ty, target, &item.fullname);
                }
            }
        }
        rg
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, from: &str, to: &str, field: &str) {
        let a = self.node(from);
        let b = self.node(to);
        self.graph.add_edge(a, b, field.to_string());
    }

    fn name(&self, idx: NodeIndex) -> String {
        self.graph.node_weight(idx).cloned().unwrap_or_default()
    }

    /// Shortest loop from `start` back to itself through `members`
    fn cycle_path(&self, start: NodeIndex, members: &HashSet<NodeIndex>) -> Vec<String> {
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for edge in self.graph.edges_directed(current, Direction::Outgoing) {
                let next = edge.target();
                if next == start {
                    let mut path = vec![self.name(start)];
                    let mut cursor = current;
                    let mut back = Vec::new();
                    while cursor != start {
                        back.push(self.name(cursor));
                        match parent.get(&cursor) {
                            Some(prev) => cursor = *prev,
                            None => break,
                        }
                    }
                    back.reverse();
                    path.extend(back);
                    path.push(self.name(start));
                    return path;
                }
                if members.contains(&next) && !parent.contains_key(&next) && next != start {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        vec![self.name(start)]
    }
}

/// User type named by an item type, looking through any array markers
fn referenced_type(ty: &str) -> Option<&str> {
    let mut inner = ty;
    while let Some(elem) = array_element(inner) {
        inner = elem;
    }
    is_user_type(inner).then_some(inner)
}

/// Reject self-referencing and mutually referencing types up front
pub fn check_reference_cycles(items: &[Item]) -> std::result::Result<(), ReferenceError> {
    let rg = ReferenceGraph::build(items);

    let mut sccs = kosaraju_scc(&rg.graph);
    for scc in &mut sccs {
        scc.sort();
    }
    sccs.sort();

    for scc in sccs {
        if scc.len() == 1 {
            let idx = scc[0];
            let self_edge = rg
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .find(|e| e.target() == idx);
            if let Some(edge) = self_edge {
                return Err(ReferenceError::SelfReference {
                    type_name: rg.name(idx),
                    field: edge.weight().clone(),
                });
            }
        } else {
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();
            let start = scc[0];
            return Err(ReferenceError::Cycle {
                type_name: rg.name(start),
                cycle: rg.cycle_path(start, &members),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Array pass
// =============================================================================

/// Move `[]E` array markers from types onto fullnames until none remain
fn resolve_array_refs(mut items: Vec<Item>) -> Vec<Item> {
    while let Some(pos) = items.iter().position(|i| array_element(&i.ty).is_some()) {
        let def = items[pos].clone();
        let elem = array_element(&def.ty).unwrap_or_default().to_string();
        let referrers = items.iter().any(|i| i.ty == def.fullname);

        if referrers {
            debug!(alias = %def.fullname, element = %elem, "expanding array alias");
            items = items
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != pos)
                .map(|(_, mut item)| {
                    if item.ty == def.fullname {
                        let name = format!("{}{}", item.fullname, ARRAY_PREFIX);
                        item.fullname = name;
                        item.set_type(elem.clone());
                    }
                    item
                })
                .collect();
        } else {
            let item = &mut items[pos];
            let name = format!("{}{}", item.fullname, ARRAY_PREFIX);
            item.fullname = name;
            item.set_type(elem);
        }
    }
    items
}

// =============================================================================
// Object pass
// =============================================================================

/// Replace each use of a user type with a reparented copy of its prototype
fn resolve_object_refs(mut items: Vec<Item>) -> Result<Vec<Item>> {
    while let Some(use_site) = items.iter().find(|i| is_user_type(&i.ty)) {
        let type_name = use_site.ty.clone();
        let field = use_site.fullname.clone();

        let prototype: Vec<Item> = items
            .iter()
            .filter(|i| is_descendant(&i.fullname, &type_name))
            .cloned()
            .collect();
        if prototype.is_empty() {
            return Err(ReferenceError::Unresolved { type_name, field }.into());
        }
        if let Some(child) = prototype.iter().find(|i| resolves_to(&i.ty, &type_name)) {
            return Err(ReferenceError::SelfReference {
                type_name,
                field: child.fullname.clone(),
            }
            .into());
        }

        debug!(type_name = %type_name, fields = prototype.len(), "expanding type reference");
        let mut next = Vec::with_capacity(items.len() + prototype.len());
        for item in items {
            if item.ty == type_name {
                next.extend(reparent(&prototype, &type_name, &item.fullname));
            } else if item.fullname == type_name || is_descendant(&item.fullname, &type_name) {
                continue;
            } else {
                next.push(item);
            }
        }
        items = next;
    }
    Ok(items)
}

fn resolves_to(ty: &str, type_name: &str) -> bool {
    referenced_type(ty) == Some(type_name)
}

fn reparent(prototype: &[Item], old_root: &str, new_root: &str) -> Vec<Item> {
    prototype
        .iter()
        .map(|proto| {
            let mut clone = proto.clone();
            let rest = &proto.fullname[old_root.len()..];
            clone.set_fullname(format!("{}{}", new_root, rest));
            clone
        })
        .collect()
}
