//! The derived, read-optimized view of the campaign hierarchy.
//!
//! Hierarchies can be as deep as the collection is long, so nothing here
//! recurses on the call stack unguarded: the view is built and dropped with
//! explicit stacks, and (de)serialization of a node grows the stack on demand.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::collate;
use crate::record::NodeKind;
use crate::tree::Forest;

/// Remaining stack below which a nested node switches to a fresh segment.
const RED_ZONE: usize = 64 * 1024;
/// Size of each extra stack segment.
const STACK_SEGMENT: usize = 1024 * 1024;

/// A node as the front-end reads it.
#[derive(Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub children: Vec<OutputNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_form_id: Option<String>,
}

impl Drop for OutputNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl Serialize for OutputNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, move || {
            let fields = if self.lead_form_id.is_some() { 5 } else { 4 };
            let mut node = serializer.serialize_struct("OutputNode", fields)?;
            node.serialize_field("id", &self.id)?;
            node.serialize_field("kind", &self.kind)?;
            node.serialize_field("name", &self.name)?;
            node.serialize_field("children", &self.children)?;
            match &self.lead_form_id {
                Some(lead_form_id) => node.serialize_field("leadFormId", lead_form_id)?,
                None => node.skip_field("leadFormId")?,
            }
            node.end()
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    id: String,
    kind: NodeKind,
    name: String,
    #[serde(default)]
    children: Vec<OutputNode>,
    #[serde(default)]
    lead_form_id: Option<String>,
}

impl<'de> Deserialize<'de> for OutputNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, move || {
            WireNode::deserialize(deserializer)
        })?;
        Ok(OutputNode {
            id: wire.id,
            kind: wire.kind,
            name: wire.name,
            children: wire.children,
            lead_form_id: wire.lead_form_id,
        })
    }
}

/// Roots of one `topParent` partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: String,
    pub roots: Vec<OutputNode>,
}

/// The compiled document: partitions in collated key order.
///
/// Serializes as a JSON object keyed by partition, keeping this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledView {
    pub partitions: Vec<Partition>,
}

impl CompiledView {
    pub fn get(&self, key: &str) -> Option<&[OutputNode]> {
        self.partitions
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.roots.as_slice())
    }

    /// Total number of nodes across all partitions.
    pub fn node_count(&self) -> usize {
        let mut pending: Vec<&OutputNode> = self.partitions.iter().flat_map(|p| &p.roots).collect();
        let mut count = 0;
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(&node.children);
        }
        count
    }
}

impl Serialize for CompiledView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.partitions.len()))?;
        for partition in &self.partitions {
            map.serialize_entry(&partition.key, &partition.roots)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CompiledView {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ViewVisitor;

        impl<'de> Visitor<'de> for ViewVisitor {
            type Value = CompiledView;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of partition keys to node arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<CompiledView, A::Error> {
                let mut partitions = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, roots)) = access.next_entry::<String, Vec<OutputNode>>()? {
                    partitions.push(Partition { key, roots });
                }
                Ok(CompiledView { partitions })
            }
        }

        deserializer.deserialize_map(ViewVisitor)
    }
}

/// JSON Schema of the published document, for front-end consumers.
pub fn view_schema() -> schemars::Schema {
    schemars::schema_for!(BTreeMap<String, Vec<OutputNode>>)
}

fn sort_siblings(nodes: &mut [OutputNode]) {
    nodes.sort_by(|a, b| collate::compare(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Convert the subtree under `root`, children before parents. `done` holds
/// finished nodes by slot until their parent claims them.
fn emit(forest: &Forest, root: usize, done: &mut [Option<OutputNode>]) -> Option<OutputNode> {
    let mut stack = vec![(root, false)];
    while let Some((slot, expanded)) = stack.pop() {
        let entry = forest.node(slot);
        if !expanded {
            stack.push((slot, true));
            stack.extend(entry.children.iter().map(|&child| (child, false)));
            continue;
        }
        let mut children: Vec<OutputNode> = entry
            .children
            .iter()
            .filter_map(|&child| done[child].take())
            .collect();
        sort_siblings(&mut children);
        done[slot] = Some(OutputNode {
            id: entry.node.id.clone(),
            kind: entry.node.kind,
            name: entry.node.name.clone(),
            children,
            lead_form_id: entry.node.lead_form_id.clone(),
        });
    }
    done[root].take()
}

/// Strip bookkeeping fields and sort every level of the forest.
pub fn serialize(forest: &Forest) -> CompiledView {
    let mut done: Vec<Option<OutputNode>> = vec![None; forest.len()];
    let mut partitions: Vec<Partition> = forest
        .partitions()
        .map(|(key, slots)| {
            let mut roots: Vec<OutputNode> = slots
                .iter()
                .filter_map(|&slot| emit(forest, slot, &mut done))
                .collect();
            sort_siblings(&mut roots);
            Partition {
                key: key.to_string(),
                roots,
            }
        })
        .collect();
    partitions.sort_by(|a, b| collate::compare(&a.key, &b.key));

    CompiledView { partitions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CanonicalNode, DEFAULT_PARTITION};
    use crate::tree;
    use serde_json::json;

    fn node(id: &str, name: &str, partition: &str, parent: Option<&str>) -> CanonicalNode {
        CanonicalNode {
            id: id.to_string(),
            top_parent: partition.to_string(),
            parent_id: parent.map(str::to_string),
            kind: NodeKind::Category,
            name: name.to_string(),
            lead_form_id: None,
        }
    }

    #[test]
    fn sorts_roots_children_and_partitions() {
        let forest = tree::build(vec![
            node("1", "zeta", "beta", None),
            node("2", "Alpha", "beta", None),
            node("3", "only", "Alpha", None),
            node("4", "b-child", "beta", Some("2")),
            node("5", "a-child", "beta", Some("2")),
        ]);
        let view = serialize(&forest);
        let keys: Vec<&str> = view.partitions.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["Alpha", "beta"]);

        let beta = view.get("beta").unwrap();
        assert_eq!(beta[0].name, "Alpha");
        assert_eq!(beta[1].name, "zeta");
        let child_names: Vec<&str> = beta[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(child_names, vec!["a-child", "b-child"]);
    }

    #[test]
    fn omits_absent_lead_form_id() {
        let mut with_form = node("1", "Dental", DEFAULT_PARTITION, None);
        with_form.lead_form_id = Some("lf-1".to_string());
        let view = serialize(&tree::build(vec![with_form, node("2", "Implants", DEFAULT_PARTITION, None)]));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(
            value,
            json!({
                "Other": [
                    {"id": "1", "kind": "category", "name": "Dental", "children": [], "leadFormId": "lf-1"},
                    {"id": "2", "kind": "category", "name": "Implants", "children": []}
                ]
            })
        );
    }

    #[test]
    fn json_keeps_collated_partition_order() {
        let view = serialize(&tree::build(vec![
            node("1", "x", "zeta", None),
            node("2", "x", "Beta", None),
            node("3", "x", "alpha", None),
        ]));
        let text = serde_json::to_string(&view).unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let beta = text.find("\"Beta\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(alpha < beta && beta < zeta);

        let back: CompiledView = serde_json::from_str(&text).unwrap();
        assert_eq!(back, view);
    }

    #[test]
    fn equal_names_order_by_id() {
        let view = serialize(&tree::build(vec![
            node("b", "Same", DEFAULT_PARTITION, None),
            node("a", "Same", DEFAULT_PARTITION, None),
        ]));
        let ids: Vec<&str> = view.get(DEFAULT_PARTITION).unwrap().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn long_chain_serializes_without_overflow() {
        let count = 50_000;
        let nodes: Vec<CanonicalNode> = (0..count)
            .map(|i| {
                let parent = (i > 0).then(|| format!("n{}", i - 1));
                node(&format!("n{i}"), &format!("level {i}"), DEFAULT_PARTITION, parent.as_deref())
            })
            .collect();
        let view = serialize(&tree::build(nodes));
        assert_eq!(view.node_count(), count);
        assert_eq!(view.get(DEFAULT_PARTITION).unwrap()[0].children[0].id, "n1");

        let text = serde_json::to_string(&view).unwrap();
        assert!(text.ends_with(&("}]".repeat(count) + "}")));
    }

    #[test]
    fn schema_describes_output_nodes() {
        let schema = serde_json::to_value(view_schema()).unwrap();
        let text = schema.to_string();
        assert!(text.contains("leadFormId"));
        assert!(text.contains("folder"));
    }
}
